//! Value Codec Module
//!
//! Encodes application values to the bytes the store persists, and back.
//! Values go through serde_json, so anything with a `Serialize` /
//! `Deserialize` impl can be cached.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encodes `value` to JSON bytes.
///
/// Fails with `CacheError::Serialization` for values JSON cannot express,
/// e.g. maps keyed by non-string types.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes JSON bytes back into a value.
///
/// A failure here means the stored payload is corrupt or was written with a
/// different type than the one requested.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
