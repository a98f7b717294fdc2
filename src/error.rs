//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Failure reported by the underlying ordered store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// redb failed to open, read, write or commit
    #[error(transparent)]
    Redb(#[from] redb::Error),

    /// Filesystem failure outside of redb (e.g. creating the data directory)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store handle has already been released
    #[error("store is closed")]
    Closed,

    /// Failure raised by a custom store implementation
    #[error("backend error: {0}")]
    Backend(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// A missing or expired key is never an error; reads report it as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Bad construction arguments
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Empty key passed to a keyed operation
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value could not be encoded, or stored bytes could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted record is truncated or carries an unknown header
    #[error("Corrupt record for key '{0}'")]
    Corrupt(String),

    /// Underlying store I/O failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Operation issued after `close()`
    #[error("Cache is closed")]
    Closed,

    /// Blocking worker task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Internal(format!("blocking task failed: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
