use std::process;
use std::sync::Arc;

use edge_config_wrapper::{synchronize, CommitTracker, Result, SyncConfig, SyncOutcome};
use log::debug;

use crate::config::CliConfig;

/// Exit code for a pass that ran but failed, distinct from configuration and
/// commit errors (1).
const FAILED_PASS_EXIT_CODE: i32 = 2;

/// Build the job configuration from the loaded file and environment.
fn sync_config(config: &CliConfig, tracker: Arc<CommitTracker>) -> SyncConfig {
    let ec = &config.edge_config;
    let mut sync = SyncConfig::new(tracker);
    sync.edge_config_id = ec.id.clone().unwrap_or_default();
    sync.team_id = ec.team_id.clone();
    sync.api_token = ec.token.clone().unwrap_or_default();
    sync.edge_config_key = ec.item_key.clone().unwrap_or_default();
    sync.split_api_key = config.upstream.api_key.clone().unwrap_or_default();
    sync.api_url = ec.api_url.clone();
    sync.sdk_url = config.upstream.sdk_url.clone();
    sync
}

/// Message and exit code for a run that did not synchronize.
fn failure(item_key: &str, outcome: &Result<SyncOutcome>) -> Option<(String, i32)> {
    match outcome {
        Ok(SyncOutcome::Synchronized) => None,
        Ok(SyncOutcome::Failed(e)) => Some((
            format!("Synchronization failed, item '{}' left unchanged: {}", item_key, e),
            FAILED_PASS_EXIT_CODE,
        )),
        Err(e) => Some((format!("Cannot synchronize: {}", e), 1)),
    }
}

pub async fn run_sync(config_path: &str, item_key_arg: Option<String>) {
    let mut config = CliConfig::load(config_path);
    config.apply_env_overrides();
    if let Some(key) = item_key_arg {
        config.edge_config.item_key = Some(key);
    }

    let tracker = Arc::new(CommitTracker::new());
    let sync = sync_config(&config, Arc::clone(&tracker));
    let item_key = sync.edge_config_key.clone();
    debug!("synchronizing into item '{}' using {}", item_key, config_path);

    if let Some((message, code)) = failure(&item_key, &synchronize(sync).await) {
        eprintln!("{}", message);
        process::exit(code);
    }

    if let Err(e) = tracker.settle().await {
        eprintln!("Failed to commit item '{}': {}", item_key, e);
        process::exit(1);
    }

    println!("✓ Synchronized flag definitions into item '{}'", item_key);
}
