use async_trait::async_trait;
use log::{Level, LevelFilter};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::Synchronizer;
use crate::error::{Error, RemoteStoreError, Result};
use crate::storage::PluggableStorage;

pub const DEFAULT_SDK_URL: &str = "https://sdk.split.io/api";

const SPLITS_TILL: &str = "SPLITIO.splits.till";
const SEGMENTS_REGISTERED: &str = "SPLITIO.segments.registered";
const ARCHIVED: &str = "ARCHIVED";

fn split_key(name: &str) -> String {
    format!("SPLITIO.split.{}", name)
}

fn traffic_type_key(name: &str) -> String {
    format!("SPLITIO.trafficType.{}", name)
}

fn segment_key(name: &str) -> String {
    format!("SPLITIO.segment.{}", name)
}

fn segment_till_key(name: &str) -> String {
    format!("SPLITIO.segment.{}.till", name)
}

// ── Upstream payloads ───────────────────────────────────────

#[derive(Deserialize)]
struct SplitChanges {
    #[serde(default)]
    splits: Vec<Value>,
    since: i64,
    till: i64,
}

#[derive(Deserialize)]
struct SegmentChanges {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
    since: i64,
    till: i64,
}

/// The parts of a flag definition the synchronizer needs to route it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SplitHeader {
    name: String,
    #[serde(default)]
    traffic_type_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Condition {
    #[serde(default)]
    matcher_group: Option<MatcherGroup>,
}

#[derive(Deserialize)]
struct MatcherGroup {
    #[serde(default)]
    matchers: Vec<Matcher>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Matcher {
    #[serde(default)]
    user_defined_segment_matcher_data: Option<SegmentMatcherData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentMatcherData {
    segment_name: String,
}

impl SplitHeader {
    fn segment_names(&self) -> Vec<String> {
        self.conditions
            .iter()
            .filter_map(|c| c.matcher_group.as_ref())
            .flat_map(|g| g.matchers.iter())
            .filter_map(|m| m.user_defined_segment_matcher_data.as_ref())
            .map(|d| d.segment_name.clone())
            .collect()
    }
}

fn traffic_type_of(definition: &str) -> Option<String> {
    serde_json::from_str::<SplitHeader>(definition)
        .ok()
        .and_then(|h| h.traffic_type_name)
}

/// Change number stored at `key`, or -1 when nothing was synchronized yet.
async fn read_till(storage: &dyn PluggableStorage, key: &str) -> Result<i64> {
    Ok(storage
        .get(key)
        .await?
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(-1))
}

// ── Synchronizer ────────────────────────────────────────────

/// Pulls flag definitions and segments from the upstream flag API and
/// writes them through a [`PluggableStorage`].
pub struct SplitSynchronizer {
    http: reqwest::Client,
    api_key: String,
    sdk_url: String,
    log_level: LevelFilter,
}

impl SplitSynchronizer {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            sdk_url: DEFAULT_SDK_URL.to_string(),
            log_level: LevelFilter::Info,
        }
    }

    pub fn sdk_url(mut self, url: &str) -> Self {
        self.sdk_url = url.to_string();
        self
    }

    /// Records above this level are dropped.
    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    fn log(&self, level: Level, message: std::fmt::Arguments) {
        if level <= self.log_level {
            log::log!(level, "{}", message);
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str, since: i64) -> Result<T> {
        let url = format!("{}/{}", self.sdk_url.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("since", since)])
            .send()
            .await
            .map_err(|e| Error::Upstream(RemoteStoreError::Transport(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Upstream(RemoteStoreError::Status(status.as_u16())));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(RemoteStoreError::Malformed(e.to_string())))
    }

    async fn apply_split(&self, storage: &dyn PluggableStorage, split: Value) -> Result<()> {
        let header: SplitHeader = serde_json::from_value(split.clone())
            .map_err(|e| Error::Upstream(RemoteStoreError::Malformed(e.to_string())))?;
        let key = split_key(&header.name);

        if header.status.as_deref() == Some(ARCHIVED) {
            if let Some(previous) = storage.get(&key).await? {
                storage.del(&key).await?;
                if let Some(tt) = traffic_type_of(&previous) {
                    storage.decrement(&traffic_type_key(&tt)).await?;
                }
                self.log(Level::Debug, format_args!("removed archived flag {}", header.name));
            }
            return Ok(());
        }

        let previous = storage.get_and_set(&key, &split.to_string()).await?;
        let previous_tt = previous.as_deref().and_then(traffic_type_of);
        if previous_tt != header.traffic_type_name {
            if let Some(tt) = &previous_tt {
                storage.decrement(&traffic_type_key(tt)).await?;
            }
            if let Some(tt) = &header.traffic_type_name {
                storage.increment(&traffic_type_key(tt)).await?;
            }
        }

        let segments = header.segment_names();
        if !segments.is_empty() {
            storage.add_items(SEGMENTS_REGISTERED, &segments).await?;
        }
        Ok(())
    }

    async fn sync_splits(&self, storage: &dyn PluggableStorage) -> Result<usize> {
        let mut since = read_till(storage, SPLITS_TILL).await?;
        let mut updated = 0;

        loop {
            let changes: SplitChanges = self.fetch("splitChanges", since).await?;
            updated += changes.splits.len();
            for split in changes.splits {
                self.apply_split(storage, split).await?;
            }
            storage.set(SPLITS_TILL, &changes.till.to_string()).await?;

            if changes.till == changes.since || changes.till == since {
                break;
            }
            since = changes.till;
        }

        Ok(updated)
    }

    async fn sync_segment(&self, storage: &dyn PluggableStorage, name: &str) -> Result<()> {
        let key = segment_key(name);
        let till_key = segment_till_key(name);
        let mut since = read_till(storage, &till_key).await?;

        loop {
            let changes: SegmentChanges = self
                .fetch(&format!("segmentChanges/{}", name), since)
                .await?;
            if !changes.added.is_empty() {
                storage.add_items(&key, &changes.added).await?;
            }
            if !changes.removed.is_empty() {
                storage.remove_items(&key, &changes.removed).await?;
            }
            storage.set(&till_key, &changes.till.to_string()).await?;

            if changes.till == changes.since || changes.till == since {
                break;
            }
            since = changes.till;
        }

        Ok(())
    }

    async fn sync_segments(&self, storage: &dyn PluggableStorage) -> Result<usize> {
        let names = storage.get_set_items(SEGMENTS_REGISTERED).await?;
        for name in &names {
            self.sync_segment(storage, name).await?;
        }
        Ok(names.len())
    }
}

#[async_trait]
impl Synchronizer for SplitSynchronizer {
    async fn execute(&self, storage: &dyn PluggableStorage) -> Result<()> {
        storage.connect().await?;

        let flags = self.sync_splits(storage).await?;
        let segments = self.sync_segments(storage).await?;
        self.log(
            Level::Info,
            format_args!("synchronized {} flag changes and {} segments", flags, segments),
        );

        storage.disconnect().await
    }
}
