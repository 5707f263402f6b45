//! One-shot synchronization of flag definitions into an edge config item.

pub mod split;

use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info, LevelFilter};

use crate::api::DEFAULT_API_URL;
use crate::error::{Error, Result};
use crate::options::ApiWrapperOptions;
use crate::storage::PluggableStorage;
use crate::wait_until::WaitUntil;
use crate::wrapper::StorageWrapper;

pub use split::{SplitSynchronizer, DEFAULT_SDK_URL};

/// Drives a synchronization pass of a flag evaluation engine into a storage.
#[async_trait]
pub trait Synchronizer: Send + Sync {
    /// Connect `storage`, write the current flag definitions into it and
    /// disconnect it.
    async fn execute(&self, storage: &dyn PluggableStorage) -> Result<()>;
}

/// Everything the synchronization job needs.
pub struct SyncConfig {
    pub edge_config_id: String,
    pub team_id: Option<String>,
    pub api_token: String,
    pub edge_config_key: String,
    /// Upstream authorization key for the flag API.
    pub split_api_key: String,
    pub wait_until: Arc<dyn WaitUntil>,
    pub api_url: String,
    pub sdk_url: String,
}

impl SyncConfig {
    pub fn new(wait_until: Arc<dyn WaitUntil>) -> Self {
        Self {
            edge_config_id: String::new(),
            team_id: None,
            api_token: String::new(),
            edge_config_key: String::new(),
            split_api_key: String::new(),
            wait_until,
            api_url: DEFAULT_API_URL.to_string(),
            sdk_url: DEFAULT_SDK_URL.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("Edge Config Id", &self.edge_config_id),
            ("API Token", &self.api_token),
            ("Edge Config Item Key", &self.edge_config_key),
            ("Split API Key", &self.split_api_key),
        ];
        match required.into_iter().find(|(_, value)| value.is_empty()) {
            Some((field, _)) => Err(Error::Configuration(field)),
            None => Ok(()),
        }
    }
}

/// How a synchronization pass ended.
#[derive(Debug)]
pub enum SyncOutcome {
    Synchronized,
    Failed(Error),
}

/// Run one synchronization pass into the configured edge config item.
///
/// Only configuration errors are returned. A failed pass is logged and
/// reported as [`SyncOutcome::Failed`]. The commit itself runs through
/// `config.wait_until`.
pub async fn synchronize(config: SyncConfig) -> Result<SyncOutcome> {
    config.validate()?;

    let mut options = ApiWrapperOptions::new(config.wait_until)
        .edge_config_id(&config.edge_config_id)
        .api_token(&config.api_token)
        .edge_config_key(&config.edge_config_key)
        .api_url(&config.api_url);
    options.team_id = config.team_id;
    let storage = StorageWrapper::api(options);

    let synchronizer = SplitSynchronizer::new(&config.split_api_key)
        .sdk_url(&config.sdk_url)
        .log_level(LevelFilter::Error);

    match synchronizer.execute(&storage).await {
        Ok(()) => {
            info!("Synchronization success");
            Ok(SyncOutcome::Synchronized)
        }
        Err(e) => {
            error!("Synchronization failed: {}", e);
            Ok(SyncOutcome::Failed(e))
        }
    }
}
