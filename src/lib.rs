//! Storage wrappers that let a feature flag SDK serve its flag definitions
//! from a single Vercel Edge Config item.
//!
//! Three variants share one [`StorageWrapper`] type:
//!
//! - [`StorageWrapper::api`]: read-write, backed by the management API. The
//!   dataset is committed back with an `upsert` on disconnect, through a
//!   caller supplied [`WaitUntil`] hook.
//! - [`StorageWrapper::sdk`]: read-only, backed by a read client.
//! - [`StorageWrapper::validating`]: read-only, and rejects items that are not
//!   flag definition snapshots.
//!
//! # Examples
//! ```no_run
//! use std::sync::Arc;
//! use edge_config_wrapper::{EdgeConfigClient, PluggableStorage, StorageWrapper};
//!
//! # async fn run() -> edge_config_wrapper::Result<()> {
//! let reader = Arc::new(EdgeConfigClient::from_env()?);
//! let storage = StorageWrapper::validating("split-flags", reader)?;
//! storage.connect().await?;
//! let till = storage.get("SPLITIO.splits.till").await?;
//! storage.disconnect().await?;
//! # let _ = till;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod dataset;
pub mod error;
pub mod options;
pub mod storage;
pub mod sync;
pub mod wait_until;
pub mod wrapper;

pub use client::{EdgeConfigClient, EdgeConfigReader};
pub use dataset::{Dataset, DatasetValue};
pub use error::{Error, RemoteStoreError, Result};
pub use options::{ApiWrapperOptions, ConnectMode, SdkWrapperOptions};
pub use storage::PluggableStorage;
pub use sync::{synchronize, SplitSynchronizer, SyncConfig, SyncOutcome, Synchronizer};
pub use wait_until::{CommitTracker, PendingCommit, WaitUntil};
pub use wrapper::{Access, ReadPolicy, StorageWrapper, SNAPSHOT_MARKER};
