//! Management API calls against a hosted edge config store.

use log::{debug, error, info};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, RemoteStoreError, Result};

pub const DEFAULT_API_URL: &str = "https://api.vercel.com/v1";
pub const DEFAULT_EDGE_CONFIG_URL: &str = "https://edge-config.vercel.com";

/// Where and how to reach one edge config store through the management API.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub api_url: String,
    pub edge_config_id: String,
    pub team_id: Option<String>,
    pub token: String,
}

impl StoreHandle {
    /// `{api_url}/edge-config/{id}/{segments..}[?teamId=..]`, each segment
    /// percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&self.api_url).map_err(|_| Error::Configuration("valid API URL"))?;
        url.path_segments_mut()
            .map_err(|_| Error::Configuration("valid API URL"))?
            .pop_if_empty()
            .push("edge-config")
            .push(&self.edge_config_id)
            .extend(segments);
        if let Some(team) = self.team_id.as_deref().filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("teamId", team);
        }
        Ok(url)
    }

    pub fn item_url(&self, item_key: &str) -> Result<Url> {
        self.endpoint(&["item", item_key])
    }

    pub fn items_url(&self) -> Result<Url> {
        self.endpoint(&["items"])
    }
}

#[derive(Deserialize)]
struct ItemResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Serialize)]
struct PatchItems<'a> {
    items: [PatchItem<'a>; 1],
}

#[derive(Serialize)]
struct PatchItem<'a> {
    operation: &'static str,
    key: &'a str,
    value: &'a Value,
}

/// Fetch the value stored at `item_key`.
///
/// `200` yields the `value` field of the body, `204` an empty object.
pub async fn fetch_edge_config(
    client: &reqwest::Client,
    store: &StoreHandle,
    item_key: &str,
) -> Result<Value> {
    let response = client
        .get(store.item_url(item_key)?)
        .bearer_auth(&store.token)
        .send()
        .await?;

    match response.status() {
        StatusCode::OK => {
            let body: ItemResponse = response
                .json()
                .await
                .map_err(|e| RemoteStoreError::Malformed(e.to_string()))?;
            debug!("edge config item '{}' fetched", item_key);
            Ok(body.value)
        }
        StatusCode::NO_CONTENT => Ok(Value::Object(Default::default())),
        status => Err(RemoteStoreError::Status(status.as_u16()).into()),
    }
}

/// Replace the value at `item_key` with `value` using an `upsert` operation.
pub async fn upsert_edge_config(
    client: &reqwest::Client,
    store: &StoreHandle,
    item_key: &str,
    value: &Value,
) -> Result<()> {
    let body = PatchItems {
        items: [PatchItem {
            operation: "upsert",
            key: item_key,
            value,
        }],
    };

    let response = client
        .patch(store.items_url()?)
        .bearer_auth(&store.token)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        error!("edge config upsert failed ({}): {}", status, text);
        return Err(RemoteStoreError::Status(status.as_u16()).into());
    }

    info!("edge config item '{}' synchronized", item_key);
    Ok(())
}

/// Compose the single-string form accepted by read clients:
/// `{host}/{edge_config_id}?token={token}`.
pub fn create_connection_string(host: &str, edge_config_id: &str, token: &str) -> String {
    format!("{}/{}?token={}", host.trim_end_matches('/'), edge_config_id, token)
}
