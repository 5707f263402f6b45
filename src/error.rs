use thiserror::Error;

/// Failure talking to the hosted store.
#[derive(Error, Debug)]
pub enum RemoteStoreError {
    /// The store answered with a status the request does not accept.
    #[error("received unexpected response code {0}")]
    Status(u16),
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Error type for edge config storage wrappers.
#[derive(Error, Debug)]
pub enum Error {
    /// A required configuration field is missing or empty.
    #[error("{0} not provided")]
    Configuration(&'static str),
    #[error("remote store error: {0}")]
    RemoteStore(#[from] RemoteStoreError),
    /// The upstream flag API could not be read.
    #[error("upstream error: {0}")]
    Upstream(RemoteStoreError),
    /// The fetched item does not look like a flag definition snapshot.
    #[error("No feature flag definitions were found in item key '{0}'")]
    Schema(String),
    /// Mutation against a read-only wrapper.
    #[error("{0} not implemented")]
    NotImplemented(&'static str),
    /// Mutation against a read-write wrapper that was never connected.
    #[error("storage wrapper is not connected")]
    NotConnected,
    /// A pending commit task was aborted before it settled.
    #[error("commit task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::RemoteStore(RemoteStoreError::Transport(e))
    }
}

/// Result type for edge config storage wrappers.
pub type Result<T> = std::result::Result<T, Error>;
