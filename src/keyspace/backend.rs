use async_trait::async_trait;
use thiserror::Error;

use crate::keyspace::pattern::KeyPattern;
use crate::keyspace::record::{KeyMetadata, KeyName};

/// Errors reported by a keyspace backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Connection dropped, timed out or refused.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failure injected by a test or demo backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// Opaque continuation token of a cursor scan.
///
/// `"0"` is both the token that starts a sweep and the token the backend
/// returns when the sweep is complete.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub const START: &'static str = "0";

    pub fn start() -> Self {
        Self(Self::START.to_string())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_start(&self) -> bool {
        self.0 == Self::START
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::start()
    }
}

/// One reply of the scan primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Token for the next call; the start token means the sweep is over.
    pub cursor: Cursor,
    /// Keys visited by this call. May repeat keys returned earlier.
    pub keys: Vec<KeyName>,
}

/// The remote key-value store, as far as browsing is concerned.
#[async_trait]
pub trait KeyspaceBackend: Send + Sync {
    /// Advance a non-blocking sweep by roughly `count` entries.
    async fn scan(
        &self,
        cursor: &Cursor,
        pattern: Option<&KeyPattern>,
        count: usize,
    ) -> Result<ScanPage, BackendError>;

    /// Fetch attributes for a batch of keys. Replies come in arbitrary order
    /// and may omit keys; callers match by name.
    async fn fetch_metadata(&self, names: &[KeyName]) -> Result<Vec<KeyMetadata>, BackendError>;

    /// Approximate number of keys in the namespace, if the backend knows it.
    async fn key_count(&self) -> Result<Option<u64>, BackendError>;
}
