use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::error::{Error, RemoteStoreError, Result};

/// Environment variable holding the default connection string.
pub const EDGE_CONFIG_ENV: &str = "EDGE_CONFIG";

/// Lightweight read access to edge config items.
#[async_trait]
pub trait EdgeConfigReader: Send + Sync {
    /// Read the value stored at `item_key`. `None` when the item does not exist.
    async fn get(&self, item_key: &str) -> Result<Option<Value>>;
}

/// Read client addressed by a connection string
/// (`{host}/{edge_config_id}?token={token}`).
#[derive(Debug, Clone)]
pub struct EdgeConfigClient {
    http: reqwest::Client,
    /// Host plus any path prefix, without the id.
    base: Url,
    edge_config_id: String,
    token: String,
}

impl EdgeConfigClient {
    pub fn new(connection_string: &str) -> Result<Self> {
        let url = Url::parse(connection_string)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or(Error::Configuration("Edge Config connection string"))?;

        let token = url
            .query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
            .filter(|t| !t.is_empty())
            .ok_or(Error::Configuration("Edge Config token"))?;

        let mut segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        let edge_config_id = segments
            .pop()
            .ok_or(Error::Configuration("Edge Config Id"))?;

        let mut base = url.clone();
        base.set_query(None);
        base.set_path(&segments.join("/"));

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            edge_config_id,
            token,
        })
    }

    /// Build a client from the `EDGE_CONFIG` environment variable.
    pub fn from_env() -> Result<Self> {
        let connection_string = std::env::var(EDGE_CONFIG_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(Error::Configuration("EDGE_CONFIG connection string"))?;
        Self::new(&connection_string)
    }

    pub fn edge_config_id(&self) -> &str {
        &self.edge_config_id
    }

    fn item_url(&self, item_key: &str) -> Url {
        let mut url = self.base.clone();
        // always a base, checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push(&self.edge_config_id)
                .push("item")
                .push(item_key);
        }
        url
    }
}

#[async_trait]
impl EdgeConfigReader for EdgeConfigClient {
    async fn get(&self, item_key: &str) -> Result<Option<Value>> {
        let response = self
            .http
            .get(self.item_url(item_key))
            .query(&[("token", self.token.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let value: Value = response
                    .json()
                    .await
                    .map_err(|e| RemoteStoreError::Malformed(e.to_string()))?;
                debug!("edge config item '{}' read", item_key);
                Ok(Some(value))
            }
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => Ok(None),
            status => Err(RemoteStoreError::Status(status.as_u16()).into()),
        }
    }
}
