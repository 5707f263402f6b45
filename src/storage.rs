use async_trait::async_trait;

use crate::error::Result;

/// Key-value, counter, set and queue operations a flag evaluation engine
/// runs against its pluggable storage. Implementations must be thread-safe.
#[async_trait]
pub trait PluggableStorage: Send + Sync {
    /// Load the dataset. Must complete before any other operation is meaningful.
    async fn connect(&self) -> Result<()>;

    /// Release the dataset, committing it first when the storage is writable.
    async fn disconnect(&self) -> Result<()>;

    /// String value at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Add or update `key`. Returns `true` on success.
    async fn set(&self, key: &str, value: &str) -> Result<bool>;

    /// Update `key` and return its previous value.
    async fn get_and_set(&self, key: &str, value: &str) -> Result<Option<String>>;

    /// Remove `key`. Succeeds whether or not it existed.
    async fn del(&self, key: &str) -> Result<bool>;

    async fn get_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Values for `keys`, positionally aligned with the input.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Add one to the counter at `key`, starting from zero.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Subtract one from the counter at `key`, starting from zero.
    async fn decrement(&self, key: &str) -> Result<i64>;

    /// Whether `item` is a member of the set at `key`. Never fails on shape.
    async fn set_contains(&self, key: &str, item: &str) -> Result<bool>;

    async fn add_items(&self, key: &str, items: &[String]) -> Result<bool>;

    async fn remove_items(&self, key: &str, items: &[String]) -> Result<bool>;

    async fn get_set_items(&self, key: &str) -> Result<Vec<String>>;

    async fn push_items(&self, key: &str, items: &[String]) -> Result<()>;

    async fn pop_items(&self, key: &str, count: usize) -> Result<Vec<String>>;

    async fn get_items_count(&self, key: &str) -> Result<usize>;
}
