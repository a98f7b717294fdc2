//! Cache Entry Module
//!
//! Defines the persisted record for a cache entry and the TTL policy.
//!
//! # Record Layout
//! ```text
//! [tag: u8][deadline_ms: u64 big-endian, only when tag = 1][payload...]
//! ```
//! The deadline lives in the record itself, so the expiry index can always be
//! rebuilt from a scan of the store.

use std::time::Duration;

use chrono::{DateTime, Utc};

const TAG_NO_DEADLINE: u8 = 0;
const TAG_DEADLINE: u8 = 1;
const DEADLINE_LEN: usize = 8;

// == Ttl ==
/// Lifetime requested for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// The entry never expires and is never swept
    #[default]
    Never,
    /// The entry expires this long after it is written
    After(Duration),
}

impl Ttl {
    /// Builds a TTL from a signed number of seconds.
    ///
    /// - negative (conventionally `-1`): no expiry
    /// - `0`: expires immediately; reads never see the value
    /// - positive: expires `secs` seconds after the write
    pub fn from_secs(secs: i64) -> Self {
        match u64::try_from(secs) {
            Ok(secs) => Ttl::After(Duration::from_secs(secs)),
            Err(_) => Ttl::Never,
        }
    }

    /// Absolute deadline (Unix ms) for a write made at `now_ms`.
    ///
    /// Partial milliseconds round up, so only a zero TTL expires on write.
    pub fn deadline_from(&self, now_ms: u64) -> Option<u64> {
        match self {
            Ttl::Never => None,
            Ttl::After(ttl) => {
                let ttl_ms = u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
                Some(now_ms.saturating_add(ttl_ms))
            }
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Never, Ttl::After)
    }
}

// == Cache Entry ==
/// A decoded store record: encoded value plus optional deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CacheEntry {
    /// Encoded value bytes
    pub payload: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub deadline: Option<u64>,
}

impl CacheEntry {
    pub fn new(payload: Vec<u8>, deadline: Option<u64>) -> Self {
        Self { payload, deadline }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is expired once the current time reaches its deadline, so a
    /// zero TTL is expired as soon as it is written.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) => now_ms >= deadline,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    // == Time To Live ==
    /// Remaining lifetime at `now_ms`; zero once expired.
    pub fn ttl_remaining_at(&self, now_ms: u64) -> Ttl {
        match self.deadline {
            Some(deadline) => Ttl::After(Duration::from_millis(deadline.saturating_sub(now_ms))),
            None => Ttl::Never,
        }
    }

    // == Encoding ==
    /// Serializes the entry into its record layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + DEADLINE_LEN + self.payload.len());
        match self.deadline {
            Some(deadline) => {
                bytes.push(TAG_DEADLINE);
                bytes.extend_from_slice(&deadline.to_be_bytes());
            }
            None => bytes.push(TAG_NO_DEADLINE),
        }
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses a record. Returns `None` for a truncated or unknown header.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (tag, rest) = bytes.split_first()?;
        match *tag {
            TAG_NO_DEADLINE => Some(Self::new(rest.to_vec(), None)),
            TAG_DEADLINE => {
                let deadline = read_deadline(rest)?;
                Some(Self::new(rest[DEADLINE_LEN..].to_vec(), Some(deadline)))
            }
            _ => None,
        }
    }

    /// Reads only the deadline of a record, without copying the payload.
    ///
    /// `Some(None)` means the record never expires.
    pub fn peek_deadline(bytes: &[u8]) -> Option<Option<u64>> {
        let (tag, rest) = bytes.split_first()?;
        match *tag {
            TAG_NO_DEADLINE => Some(None),
            TAG_DEADLINE => read_deadline(rest).map(Some),
            _ => None,
        }
    }
}

fn read_deadline(bytes: &[u8]) -> Option<u64> {
    let raw: [u8; DEADLINE_LEN] = bytes.get(..DEADLINE_LEN)?.try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Formats a Unix millisecond deadline for log output.
pub(crate) fn format_deadline(deadline_ms: u64) -> String {
    i64::try_from(deadline_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| deadline_ms.to_string(), |at| at.to_rfc3339())
}
