use std::sync::Mutex;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// A commit handed off by `disconnect` that has not settled yet.
pub type PendingCommit = BoxFuture<'static, Result<()>>;

/// Host hook that keeps the invocation alive until a pending commit settles.
///
/// Any `Fn(PendingCommit)` closure works, e.g. one forwarding to a runtime's
/// own lifecycle API.
pub trait WaitUntil: Send + Sync {
    fn wait_until(&self, commit: PendingCommit);
}

impl<F> WaitUntil for F
where
    F: Fn(PendingCommit) + Send + Sync,
{
    fn wait_until(&self, commit: PendingCommit) {
        self(commit)
    }
}

/// Spawns pending commits on the current tokio runtime and lets the host
/// await all of them before exiting.
#[derive(Default)]
pub struct CommitTracker {
    handles: Mutex<Vec<JoinHandle<Result<()>>>>,
}

impl CommitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits handed off and not yet awaited via [`settle`](Self::settle).
    pub fn pending(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Await every pending commit. Returns the first failure, after all of
    /// them have settled.
    pub async fn settle(&self) -> Result<()> {
        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let mut outcome = Ok(());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Task(e.to_string())),
            };
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

impl WaitUntil for CommitTracker {
    fn wait_until(&self, commit: PendingCommit) {
        let handle = tokio::spawn(commit);
        match self.handles.lock() {
            Ok(mut handles) => handles.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }
}
