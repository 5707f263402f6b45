//! The storage wrapper shared by every edge config variant.
//!
//! One [`StorageWrapper`] type covers all variants. They differ only in
//! where the dataset comes from ([`Source`]), whether it may be mutated
//! ([`Access`]), how non-string values are read ([`ReadPolicy`]) and whether
//! the fetched item must look like a flag definition snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::api::{self, StoreHandle};
use crate::client::{EdgeConfigClient, EdgeConfigReader};
use crate::dataset::{Dataset, DatasetValue};
use crate::error::{Error, RemoteStoreError, Result};
use crate::options::{ApiWrapperOptions, ConnectMode, SdkWrapperOptions};
use crate::storage::PluggableStorage;
use crate::wait_until::WaitUntil;

/// Field every genuine flag definition snapshot carries.
pub const SNAPSHOT_MARKER: &str = "SPLITIO.splits.till";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// How `get`/`get_many` treat values that are not strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Non-string values read as absent.
    StringsOnly,
    /// Non-string values read as their serialized JSON.
    Stringify,
}

/// Where the dataset is fetched from and committed to.
enum Source {
    /// Management API: fetch the item, upsert it back on disconnect.
    Api {
        http: reqwest::Client,
        store: StoreHandle,
        wait_until: Arc<dyn WaitUntil>,
        mode: ConnectMode,
    },
    /// A read client supplied by the caller or built from a connection string.
    Reader(Arc<dyn EdgeConfigReader>),
    /// Read client built from the `EDGE_CONFIG` environment at connect time.
    Env,
}

/// Dataset plus the connect/disconnect cycle it belongs to.
///
/// The dataset is unset until a connect succeeds, so "never loaded" can be
/// told apart from "loaded and empty". Every connect and disconnect advances
/// `cycle`; background fetches and commits only write back while the cycle
/// they started in is still current.
#[derive(Default)]
struct SlotState {
    dataset: Option<Dataset>,
    cycle: u64,
}

impl SlotState {
    fn advance(&mut self) -> u64 {
        self.cycle = self.cycle.wrapping_add(1);
        self.cycle
    }

    /// Start a new cycle holding `dataset`.
    fn begin(&mut self, dataset: Option<Dataset>) -> u64 {
        self.dataset = dataset;
        self.advance()
    }

    /// Replace the dataset if `cycle` is still current.
    fn settle(&mut self, cycle: u64, dataset: Option<Dataset>) -> bool {
        if self.cycle != cycle {
            return false;
        }
        self.dataset = dataset;
        true
    }
}

type Slot = Arc<RwLock<SlotState>>;

/// Storage wrapper over a single edge config item.
pub struct StorageWrapper {
    item_key: String,
    source: Source,
    access: Access,
    read_policy: ReadPolicy,
    validate: bool,
    data: Slot,
}

impl StorageWrapper {
    /// Read-write wrapper backed by the management API.
    pub fn api(options: ApiWrapperOptions) -> Self {
        Self {
            item_key: options.edge_config_key,
            source: Source::Api {
                http: reqwest::Client::new(),
                store: StoreHandle {
                    api_url: options.api_url,
                    edge_config_id: options.edge_config_id,
                    team_id: options.team_id,
                    token: options.api_token,
                },
                wait_until: options.wait_until,
                mode: options.connect_mode,
            },
            access: Access::ReadWrite,
            read_policy: ReadPolicy::StringsOnly,
            validate: false,
            data: Arc::default(),
        }
    }

    /// Read-only wrapper backed by a read client.
    ///
    /// With both an edge config id and token, the client is built from a
    /// connection string. Otherwise the supplied reader is used, falling back
    /// to the `EDGE_CONFIG` environment variable.
    pub fn sdk(options: SdkWrapperOptions) -> Result<Self> {
        let source = match (
            non_empty(options.edge_config_id.as_deref()),
            non_empty(options.edge_config_token.as_deref()),
        ) {
            (Some(id), Some(token)) => {
                let connection_string =
                    api::create_connection_string(&options.edge_config_url, id, token);
                Source::Reader(Arc::new(EdgeConfigClient::new(&connection_string)?))
            }
            _ => match options.reader {
                Some(reader) => Source::Reader(reader),
                None => Source::Env,
            },
        };

        Ok(Self {
            item_key: options.edge_config_key,
            source,
            access: Access::ReadOnly,
            read_policy: ReadPolicy::Stringify,
            validate: false,
            data: Arc::default(),
        })
    }

    /// Read-only wrapper that only accepts flag definition snapshots.
    pub fn validating(
        item_key: impl Into<String>,
        reader: Arc<dyn EdgeConfigReader>,
    ) -> Result<Self> {
        let item_key = item_key.into();
        if item_key.is_empty() {
            return Err(Error::Configuration("Edge Config Item Key"));
        }

        Ok(Self {
            item_key,
            source: Source::Reader(reader),
            access: Access::ReadOnly,
            read_policy: ReadPolicy::Stringify,
            validate: true,
            data: Arc::default(),
        })
    }

    pub fn item_key(&self) -> &str {
        &self.item_key
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    /// Whether a dataset has been established by `connect`.
    pub async fn is_connected(&self) -> bool {
        self.data.read().await.dataset.is_some()
    }

    /// Copy of the current dataset, if any.
    pub async fn snapshot(&self) -> Option<Dataset> {
        self.data.read().await.dataset.clone()
    }

    fn check_config(&self) -> Result<()> {
        if let Source::Api { store, .. } = &self.source {
            if store.edge_config_id.is_empty() {
                return Err(Error::Configuration("Edge Config Id"));
            }
        }
        if self.item_key.is_empty() {
            return Err(Error::Configuration("Edge Config Item Key"));
        }
        if let Source::Api { store, .. } = &self.source {
            if store.token.is_empty() {
                return Err(Error::Configuration("API Token"));
            }
        }
        Ok(())
    }

    fn to_dataset(&self, value: Option<Value>) -> Result<Dataset> {
        if self.validate {
            return match value {
                Some(Value::Object(map)) if map.contains_key(SNAPSHOT_MARKER) => {
                    Dataset::from_json(Value::Object(map))
                        .ok_or_else(|| Error::Schema(self.item_key.clone()))
                }
                _ => Err(Error::Schema(self.item_key.clone())),
            };
        }

        Dataset::from_json(value.unwrap_or(Value::Null)).ok_or_else(|| {
            RemoteStoreError::Malformed(format!(
                "item '{}' does not hold a JSON object",
                self.item_key
            ))
            .into()
        })
    }

    fn read(&self, value: Option<&DatasetValue>) -> Option<String> {
        match self.read_policy {
            ReadPolicy::StringsOnly => value.and_then(DatasetValue::as_text).map(String::from),
            ReadPolicy::Stringify => value.and_then(DatasetValue::stringify),
        }
    }

    fn writable(&self, operation: &'static str) -> Result<()> {
        match self.access {
            Access::ReadWrite => Ok(()),
            Access::ReadOnly => Err(Error::NotImplemented(operation)),
        }
    }

    /// Run `f` against the dataset of a writable, connected wrapper.
    async fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Dataset) -> T,
    ) -> Result<T> {
        self.writable(operation)?;
        let mut state = self.data.write().await;
        let dataset = state.dataset.as_mut().ok_or(Error::NotConnected)?;
        Ok(f(dataset))
    }

    /// Run `f` against the dataset; an unset dataset reads as empty.
    async fn inspect<T>(&self, f: impl FnOnce(&Dataset) -> T) -> T {
        let state = self.data.read().await;
        match state.dataset.as_ref() {
            Some(dataset) => f(dataset),
            None => f(&Dataset::new()),
        }
    }

    /// Fetch through the management API into the cycle `connect` started.
    async fn connect_api(
        &self,
        http: &reqwest::Client,
        store: &StoreHandle,
        mode: ConnectMode,
        cycle: u64,
    ) -> Result<()> {
        match mode {
            ConnectMode::Blocking => {
                let value = api::fetch_edge_config(http, store, &self.item_key).await?;
                let dataset = self.to_dataset(Some(value))?;
                debug!("edge config read {} keys", dataset.len());
                if !self.data.write().await.settle(cycle, Some(dataset)) {
                    debug!("edge config connect superseded, fetched item dropped");
                }
            }
            ConnectMode::Background => {
                self.data.write().await.settle(cycle, Some(Dataset::new()));

                let http = http.clone();
                let store = store.clone();
                let item_key = self.item_key.clone();
                let slot = Arc::clone(&self.data);
                tokio::spawn(async move {
                    let fetched = api::fetch_edge_config(&http, &store, &item_key)
                        .await
                        .and_then(|value| {
                            Dataset::from_json(value).ok_or_else(|| {
                                RemoteStoreError::Malformed(format!(
                                    "item '{}' does not hold a JSON object",
                                    item_key
                                ))
                                .into()
                            })
                        });
                    let mut state = slot.write().await;
                    match fetched {
                        Ok(dataset) => {
                            if !state.settle(cycle, Some(dataset)) {
                                debug!("edge config background fetch landed after disconnect");
                            }
                        }
                        Err(e) => {
                            error!("edge config background fetch failed: {}", e);
                            // unset, so nothing gets committed over the remote item
                            state.settle(cycle, None);
                        }
                    }
                });
            }
        }
        Ok(())
    }

    /// Install a dataset read through a read client.
    async fn load(&self, value: Option<Value>) -> Result<()> {
        let dataset = self.to_dataset(value)?;
        if dataset.is_empty() {
            warn!("edge config item '{}' is empty", self.item_key);
        }
        self.data.write().await.begin(Some(dataset));
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl PluggableStorage for StorageWrapper {
    async fn connect(&self) -> Result<()> {
        match &self.source {
            Source::Api {
                http, store, mode, ..
            } => {
                // a failed connect leaves the wrapper unset, never empty
                let cycle = self.data.write().await.begin(None);
                self.check_config()?;
                info!("edge config API connect");
                self.connect_api(http, store, *mode, cycle).await
            }
            Source::Reader(reader) => {
                self.check_config()?;
                self.load(reader.get(&self.item_key).await?).await
            }
            Source::Env => {
                self.check_config()?;
                let reader = EdgeConfigClient::from_env()?;
                self.load(reader.get(&self.item_key).await?).await
            }
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let Source::Api {
            http,
            store,
            wait_until,
            ..
        } = &self.source
        else {
            self.data.write().await.begin(Some(Dataset::new()));
            return Ok(());
        };

        let (dataset, cycle) = {
            let mut state = self.data.write().await;
            let Some(dataset) = state.dataset.clone() else {
                warn!(
                    "edge config item '{}' was never loaded, nothing to commit",
                    self.item_key
                );
                return Ok(());
            };
            (dataset, state.advance())
        };
        let http = http.clone();
        let store = store.clone();
        let item_key = self.item_key.clone();
        let slot = Arc::clone(&self.data);

        info!(
            "edge config commit of {} keys scheduled (hash: {})",
            dataset.len(),
            dataset.fingerprint()
        );

        wait_until.wait_until(
            async move {
                let result =
                    api::upsert_edge_config(&http, &store, &item_key, &dataset.to_json()).await;
                if let Err(ref e) = result {
                    error!("edge config commit failed: {}", e);
                }
                // cleared, so a repeated disconnect cannot commit again
                slot.write().await.settle(cycle, None);
                result
            }
            .boxed(),
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inspect(|d| self.read(d.get(key))).await)
    }

    async fn set(&self, key: &str, value: &str) -> Result<bool> {
        self.mutate("SET", |d| {
            d.insert(key, value);
            true
        })
        .await
    }

    async fn get_and_set(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.mutate("GET AND SET", |d| {
            let previous = d.insert(key, value);
            self.read(previous.as_ref())
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.mutate("DEL", |d| {
            d.remove(key);
            true
        })
        .await
    }

    async fn get_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.inspect(|d| d.keys_with_prefix(prefix)).await)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        Ok(self
            .inspect(|d| keys.iter().map(|key| self.read(d.get(key))).collect())
            .await)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        self.mutate("INCR", |d| d.add_to_counter(key, 1)).await
    }

    async fn decrement(&self, key: &str) -> Result<i64> {
        self.mutate("DECR", |d| d.add_to_counter(key, -1)).await
    }

    async fn set_contains(&self, key: &str, item: &str) -> Result<bool> {
        Ok(self.inspect(|d| d.set_contains(key, item)).await)
    }

    async fn add_items(&self, key: &str, items: &[String]) -> Result<bool> {
        self.mutate("ADD ITEMS", |d| {
            d.add_items(key, items);
            true
        })
        .await
    }

    async fn remove_items(&self, key: &str, items: &[String]) -> Result<bool> {
        self.mutate("REMOVE ITEMS", |d| {
            d.remove_items(key, items);
            true
        })
        .await
    }

    async fn get_set_items(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.inspect(|d| d.set_items(key)).await)
    }

    // Queue operations stay inert: the consuming client never tracks
    // impressions or events through this storage.

    async fn push_items(&self, _key: &str, _items: &[String]) -> Result<()> {
        Ok(())
    }

    async fn pop_items(&self, _key: &str, _count: usize) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_items_count(&self, _key: &str) -> Result<usize> {
        Ok(0)
    }
}
