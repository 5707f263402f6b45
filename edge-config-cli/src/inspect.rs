use std::process;
use std::sync::Arc;

use edge_config_wrapper::api::create_connection_string;
use edge_config_wrapper::{
    EdgeConfigClient, EdgeConfigReader, PluggableStorage, SdkWrapperOptions, StorageWrapper,
};
use log::debug;

use crate::config::{CliConfig, EdgeConfigSection};

pub struct InspectArgs {
    pub config_path: String,
    pub item_key: Option<String>,
    pub validate: bool,
    pub prefix: String,
    pub key: Option<String>,
    pub connection_string: Option<String>,
}

/// Resolve the read connection string from: id + read token > --connection-string / EDGE_CONFIG
fn resolve_connection_string(ec: &EdgeConfigSection, arg: Option<&str>) -> Option<String> {
    match (ec.id.as_deref(), ec.read_token.as_deref()) {
        (Some(id), Some(token)) => Some(create_connection_string(&ec.read_url, id, token)),
        _ => arg.filter(|s| !s.is_empty()).map(String::from),
    }
}

pub async fn run_inspect(args: InspectArgs) {
    let mut config = CliConfig::load(&args.config_path);
    config.apply_env_overrides();

    let item_key = match args.item_key.or(config.edge_config.item_key.clone()) {
        Some(key) => key,
        None => {
            eprintln!("No item key specified. Use --item-key, set EDGE_CONFIG_ITEM_KEY, or configure [edge_config] in edge-config.toml");
            process::exit(1);
        }
    };

    let connection_string =
        match resolve_connection_string(&config.edge_config, args.connection_string.as_deref()) {
            Some(c) => c,
            None => {
                eprintln!("No read access configured. Set id and read_token in edge-config.toml, or EDGE_CONFIG");
                process::exit(1);
            }
        };

    let reader: Arc<dyn EdgeConfigReader> = match EdgeConfigClient::new(&connection_string) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Invalid connection string: {}", e);
            process::exit(1);
        }
    };

    let storage = if args.validate {
        StorageWrapper::validating(item_key.as_str(), reader)
    } else {
        StorageWrapper::sdk(SdkWrapperOptions::new(&item_key).reader(reader))
    };
    let storage = match storage {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    debug!("inspecting item '{}', validate={}", item_key, args.validate);
    if let Err(e) = storage.connect().await {
        eprintln!("Failed to load item '{}': {}", item_key, e);
        process::exit(1);
    }

    match storage.get_keys_by_prefix(&args.prefix).await {
        Ok(keys) => {
            println!("{} keys in '{}'", keys.len(), storage.item_key());
            for key in keys {
                println!("  {}", key);
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }

    if let Some(key) = args.key.as_deref() {
        print_value(&storage, key).await;
    }

    // read-only variants never commit, this only drops the loaded dataset
    let _ = storage.disconnect().await;
}

async fn print_value(storage: &StorageWrapper, key: &str) {
    match storage.get(key).await {
        Ok(Some(value)) => println!("{} = {}", key, value),
        Ok(None) => match storage.get_set_items(key).await {
            Ok(items) if !items.is_empty() => println!("{} = [{}]", key, items.join(", ")),
            Ok(_) => println!("{} is not set", key),
            Err(e) => eprintln!("{}", e),
        },
        Err(e) => eprintln!("{}", e),
    }
}
