use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::Digest;

/// A single value held in a [`Dataset`].
///
/// Values are classified once when the dataset is loaded. Operations that
/// expect a particular shape treat every other shape as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetValue {
    /// Integer counter, as written by `increment`/`decrement`.
    Counter(i64),
    Text(String),
    /// Unordered set of strings stored as a list without duplicates.
    Set(Vec<String>),
    /// Anything else the remote item contains (objects, floats, booleans, null).
    Json(Value),
}

impl DatasetValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DatasetValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_counter(&self) -> Option<i64> {
        match self {
            DatasetValue::Counter(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[String]> {
        match self {
            DatasetValue::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Serialized string form. Strings are returned as-is, `null` is absent.
    pub fn stringify(&self) -> Option<String> {
        match self {
            DatasetValue::Text(s) => Some(s.clone()),
            DatasetValue::Counter(n) => Some(n.to_string()),
            DatasetValue::Set(items) => serde_json::to_string(items).ok(),
            DatasetValue::Json(Value::Null) => None,
            DatasetValue::Json(v) => Some(v.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DatasetValue::Counter(n) => Value::from(*n),
            DatasetValue::Text(s) => Value::String(s.clone()),
            DatasetValue::Set(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            DatasetValue::Json(v) => v.clone(),
        }
    }
}

impl From<&str> for DatasetValue {
    fn from(s: &str) -> Self {
        DatasetValue::Text(s.to_string())
    }
}

impl From<String> for DatasetValue {
    fn from(s: String) -> Self {
        DatasetValue::Text(s)
    }
}

impl From<i64> for DatasetValue {
    fn from(n: i64) -> Self {
        DatasetValue::Counter(n)
    }
}

/// The in-memory snapshot of one remote edge config item.
///
/// Keys are kept ordered so prefix scans are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    entries: BTreeMap<String, DatasetValue>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from a remote JSON value. `null` yields an empty
    /// dataset; anything that is not an object is rejected.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            Value::Object(map) => Some(Self {
                entries: map
                    .into_iter()
                    .map(|(k, v)| {
                        let value = serde_json::from_value(v.clone())
                            .unwrap_or(DatasetValue::Json(v));
                        (k, value)
                    })
                    .collect(),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// SHA-1 of the serialized dataset, used to identify commits in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha1::Sha1::new();
        hasher.update(self.to_json().to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&DatasetValue> {
        self.entries.get(key)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: &str, value: impl Into<DatasetValue>) -> Option<DatasetValue> {
        self.entries.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<DatasetValue> {
        self.entries.remove(key)
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Add `delta` to the counter at `key`. A missing or non-counter value
    /// counts as zero. Returns the stored result.
    pub fn add_to_counter(&mut self, key: &str, delta: i64) -> i64 {
        let current = self.get(key).and_then(DatasetValue::as_counter).unwrap_or(0);
        let next = current.saturating_add(delta);
        self.insert(key, DatasetValue::Counter(next));
        next
    }

    pub fn set_contains(&self, key: &str, item: &str) -> bool {
        self.get(key)
            .and_then(DatasetValue::as_set)
            .map(|items| contains(items, item))
            .unwrap_or(false)
    }

    pub fn set_items(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(DatasetValue::as_set)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Union `items` into the set at `key`, creating it when the key is
    /// missing or holds something other than a set.
    pub fn add_items(&mut self, key: &str, items: &[String]) {
        let mut merged = self.set_items(key);
        merged.extend_from_slice(items);
        self.insert(key, DatasetValue::Set(unique(merged)));
    }

    /// Remove `items` from the set at `key`. No-op when there is no set.
    pub fn remove_items(&mut self, key: &str, items: &[String]) {
        if let Some(DatasetValue::Set(current)) = self.entries.get_mut(key) {
            current.retain(|entry| !contains(items, entry));
        }
    }
}

/// Linear membership test.
pub fn contains(items: &[String], item: &str) -> bool {
    items.iter().any(|entry| entry == item)
}

/// Drop duplicates, keeping the first occurrence of each item.
pub fn unique(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
