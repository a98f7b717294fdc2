//! Cache Module
//!
//! TTL-aware key-value cache over an ordered store: value codec, record
//! format, expiry index, the blocking engine and the public handles.

mod codec;
mod engine;
mod entry;
mod expiry;
mod stats;
mod store;


// Re-export public types
pub use codec::{decode, encode};
pub use entry::Ttl;
pub use stats::CacheStats;
pub use store::{BlockingCache, Cache};

pub(crate) use engine::CacheEngine;
