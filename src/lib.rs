//! TTL Cache - A key-value cache over an ordered on-disk store
//!
//! Adds per-entry time-to-live expiry, value serialization and key
//! namespacing to a store that has none of these. Expired entries read as
//! absent immediately; a background sweeper reclaims their space later.

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;
pub mod tasks;

pub use cache::{BlockingCache, Cache, CacheStats, Ttl};
pub use config::{CacheOptions, StoreOptions};
pub use error::{CacheError, Result, StoreError};
pub use storage::{MemoryStore, OrderedStore, RedbStore};
pub use tasks::SweeperState;
