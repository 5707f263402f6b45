use std::sync::Arc;

use crate::api::{DEFAULT_API_URL, DEFAULT_EDGE_CONFIG_URL};
use crate::client::EdgeConfigReader;
use crate::wait_until::WaitUntil;

/// Whether `connect` on the API-backed wrapper waits for its fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectMode {
    /// `connect` returns once the dataset is loaded.
    #[default]
    Blocking,
    /// `connect` returns immediately with an empty dataset; the fetched item
    /// replaces it whenever the request completes. Operations issued in the
    /// meantime observe whichever revision is current, and writes made before
    /// the fetch lands are lost.
    ///
    /// If the fetch fails, the wrapper becomes unset again: mutations fail
    /// with `NotConnected` and `disconnect` commits nothing. A fetch that
    /// completes after `disconnect` (or a later `connect`) is discarded.
    Background,
}

/// Options for the read-write wrapper backed by the management API.
pub struct ApiWrapperOptions {
    pub edge_config_id: String,
    pub team_id: Option<String>,
    pub api_token: String,
    /// Item key holding the flag definitions.
    pub edge_config_key: String,
    /// Receives the commit scheduled by `disconnect`.
    pub wait_until: Arc<dyn WaitUntil>,
    pub api_url: String,
    pub connect_mode: ConnectMode,
}

impl ApiWrapperOptions {
    pub fn new(wait_until: Arc<dyn WaitUntil>) -> Self {
        Self {
            edge_config_id: String::new(),
            team_id: None,
            api_token: String::new(),
            edge_config_key: String::new(),
            wait_until,
            api_url: DEFAULT_API_URL.to_string(),
            connect_mode: ConnectMode::default(),
        }
    }

    pub fn edge_config_id(mut self, id: &str) -> Self {
        self.edge_config_id = id.to_string();
        self
    }

    pub fn team_id(mut self, team_id: &str) -> Self {
        self.team_id = Some(team_id.to_string());
        self
    }

    pub fn api_token(mut self, token: &str) -> Self {
        self.api_token = token.to_string();
        self
    }

    pub fn edge_config_key(mut self, key: &str) -> Self {
        self.edge_config_key = key.to_string();
        self
    }

    pub fn api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    pub fn connect_mode(mut self, mode: ConnectMode) -> Self {
        self.connect_mode = mode;
        self
    }
}

/// Options for the read-only wrapper backed by a read client.
pub struct SdkWrapperOptions {
    pub edge_config_key: String,
    pub edge_config_id: Option<String>,
    pub edge_config_token: Option<String>,
    /// Read client used when no id/token pair is configured.
    pub reader: Option<Arc<dyn EdgeConfigReader>>,
    /// Host the connection string points at.
    pub edge_config_url: String,
}

impl Default for SdkWrapperOptions {
    fn default() -> Self {
        Self {
            edge_config_key: String::new(),
            edge_config_id: None,
            edge_config_token: None,
            reader: None,
            edge_config_url: DEFAULT_EDGE_CONFIG_URL.to_string(),
        }
    }
}

impl SdkWrapperOptions {
    pub fn new(edge_config_key: &str) -> Self {
        Self {
            edge_config_key: edge_config_key.to_string(),
            ..Self::default()
        }
    }

    pub fn edge_config_id(mut self, id: &str) -> Self {
        self.edge_config_id = Some(id.to_string());
        self
    }

    pub fn edge_config_token(mut self, token: &str) -> Self {
        self.edge_config_token = Some(token.to_string());
        self
    }

    pub fn reader(mut self, reader: Arc<dyn EdgeConfigReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn edge_config_url(mut self, url: &str) -> Self {
        self.edge_config_url = url.to_string();
        self
    }
}
