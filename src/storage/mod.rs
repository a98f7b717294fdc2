//! Storage Module
//!
//! The ordered byte-oriented key-value store the cache is layered on.
//!
//! # Backends
//! - `RedbStore`: persistent, crash-consistent storage in a single redb file
//! - `MemoryStore`: non-persistent `BTreeMap` storage for tests and embedding
//!
//! Implement [`OrderedStore`] to plug in anything else.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Ordered key-value store contract.
///
/// All methods are blocking. Implementations must be safe to call from
/// several threads at once; the cache calls them from tokio's blocking pool.
pub trait OrderedStore: Send + Sync + 'static {
    /// Returns the bytes stored under `key`, or `None` if there are none.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Returns every pair whose key starts with `prefix`, in ascending key order.
    fn scan(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Releases the store. Later calls fail with [`StoreError::Closed`].
    ///
    /// Closing twice is not an error.
    fn close(&self) -> StoreResult<()>;
}
