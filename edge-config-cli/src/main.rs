mod config;
mod inspect;
mod sync;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "edge-config")]
#[command(version = "0.1.4")]
#[command(about = "Keep feature flag definitions in a Vercel Edge Config item", long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize flag definitions from the upstream API into the item
    Sync {
        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "edge-config.toml")]
        config: String,

        /// Edge Config item that holds the flag definitions
        #[arg(short = 'k', long = "item-key")]
        item_key: Option<String>,
    },
    /// Print what a read-only wrapper sees in the item
    Inspect {
        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "edge-config.toml")]
        config: String,

        /// Edge Config item that holds the flag definitions
        #[arg(short = 'k', long = "item-key")]
        item_key: Option<String>,

        /// Reject items that are not flag definition snapshots
        #[arg(long = "validate")]
        validate: bool,

        /// Only list keys starting with this prefix
        #[arg(short = 'p', long = "prefix", default_value = "")]
        prefix: String,

        /// Print the value stored under this key
        #[arg(long = "key")]
        key: Option<String>,

        /// Read connection string, used when no id and read token are configured
        #[arg(long = "connection-string", env = "EDGE_CONFIG")]
        connection_string: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let cli = Args::parse();
    match cli.cmd {
        Command::Sync { config, item_key } => sync::run_sync(&config, item_key).await,
        Command::Inspect {
            config,
            item_key,
            validate,
            prefix,
            key,
            connection_string,
        } => {
            inspect::run_inspect(inspect::InspectArgs {
                config_path: config,
                item_key,
                validate,
                prefix,
                key,
                connection_string,
            })
            .await
        }
    }
}
