use std::env;

use edge_config_wrapper::api::{DEFAULT_API_URL, DEFAULT_EDGE_CONFIG_URL};
use edge_config_wrapper::sync::DEFAULT_SDK_URL;
use serde::Deserialize;

/// Top-level edge-config.toml configuration
#[derive(Debug, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub edge_config: EdgeConfigSection,
    #[serde(default)]
    pub upstream: UpstreamSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EdgeConfigSection {
    pub id: Option<String>,
    pub team_id: Option<String>,
    /// Management API token, needed to write.
    pub token: Option<String>,
    pub item_key: Option<String>,
    /// Read token for connection strings.
    pub read_token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_read_url")]
    pub read_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSection {
    pub api_key: Option<String>,
    #[serde(default = "default_sdk_url")]
    pub sdk_url: String,
}

// ── Default value functions ──────────────────────────

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_read_url() -> String {
    DEFAULT_EDGE_CONFIG_URL.to_string()
}

fn default_sdk_url() -> String {
    DEFAULT_SDK_URL.to_string()
}

impl Default for EdgeConfigSection {
    fn default() -> Self {
        Self {
            id: None,
            team_id: None,
            token: None,
            item_key: None,
            read_token: None,
            api_url: default_api_url(),
            read_url: default_read_url(),
        }
    }
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            api_key: None,
            sdk_url: default_sdk_url(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults if the file
    /// doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(path, &content),
            Err(_) => Self::default(),
        }
    }

    fn parse(path: &str, content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: failed to parse {}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let ec = &mut self.edge_config;

        if let Some(val) = lookup("EDGE_CONFIG_ID") {
            ec.id = Some(val);
        }
        if let Some(val) = lookup("VERCEL_TEAM_ID") {
            ec.team_id = Some(val);
        }
        if let Some(val) = lookup("VERCEL_API_TOKEN") {
            ec.token = Some(val);
        }
        if let Some(val) = lookup("EDGE_CONFIG_ITEM_KEY") {
            ec.item_key = Some(val);
        }
        if let Some(val) = lookup("EDGE_CONFIG_TOKEN") {
            ec.read_token = Some(val);
        }
        if let Some(val) = lookup("SPLIT_API_KEY") {
            self.upstream.api_key = Some(val);
        }
        if let Some(val) = lookup("SPLIT_SDK_URL") {
            self.upstream.sdk_url = val;
        }
    }
}
