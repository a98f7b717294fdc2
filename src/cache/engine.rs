//! Cache Engine Module
//!
//! Blocking engine combining the ordered store with the expiry index. Both
//! the async [`Cache`](super::Cache) and the sweeper drive this type from
//! tokio's blocking pool.
//!
//! # Locking
//! - `open` gate: every operation holds a read guard for its whole duration;
//!   `close` takes the write guard, so it waits for in-flight work.
//! - `index` mutex: every store mutation happens together with its index
//!   update while the mutex is held. Whenever the mutex is free, index and
//!   data agree.
//!
//! Reads take no index lock. A record's own deadline decides whether it is
//! alive; the index only drives reclamation.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::cache::entry::{current_timestamp_ms, format_deadline, CacheEntry, Ttl};
use crate::cache::expiry::ExpiryIndex;
use crate::cache::stats::{CacheStats, StatsCounters};
use crate::error::{CacheError, Result};
use crate::storage::OrderedStore;

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SweepReport {
    /// Expired entries deleted
    pub removed: u64,
    /// Expired entries whose deletion failed; retried next cycle
    pub failed: u64,
}

/// Rejects keys the cache cannot store.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

// == Cache Engine ==
pub(crate) struct CacheEngine {
    store: Arc<dyn OrderedStore>,
    prefix: String,
    open: RwLock<bool>,
    index: Mutex<ExpiryIndex>,
    stats: StatsCounters,
}

impl CacheEngine {
    // == Constructor ==
    /// Builds the engine and rebuilds the expiry index from the records under
    /// `prefix`. Records that already expired are indexed too, so the first
    /// sweep reclaims them.
    pub fn open(store: Arc<dyn OrderedStore>, prefix: String) -> Result<Self> {
        let mut index = ExpiryIndex::new();
        for (key, record) in store.scan(&prefix)? {
            match CacheEntry::peek_deadline(&record) {
                Some(Some(deadline)) => index.register(&key, deadline),
                Some(None) => {}
                None => warn!(key = %key, "Skipping unreadable record while rebuilding expiry index"),
            }
        }

        debug!("Rebuilt expiry index with {} entries", index.len());

        Ok(Self {
            store,
            prefix,
            open: RwLock::new(true),
            index: Mutex::new(index),
            stats: StatsCounters::default(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Holds the cache open for the duration of an operation.
    fn gate(&self) -> Result<RwLockReadGuard<'_, bool>> {
        let open = self.open.read();
        if !*open {
            return Err(CacheError::Closed);
        }
        Ok(open)
    }

    pub fn ensure_open(&self) -> Result<()> {
        self.gate().map(|_| ())
    }

    pub fn is_closed(&self) -> bool {
        !*self.open.read()
    }

    // == Set ==
    /// Writes an encoded value, replacing any previous value and deadline.
    ///
    /// The value and its deadline go to the store as a single record, so no
    /// reader can see a mix of old and new.
    pub fn set(&self, key: &str, payload: Vec<u8>, ttl: Ttl) -> Result<()> {
        validate_key(key)?;
        let _open = self.gate()?;

        let key = self.namespaced(key);
        let deadline = ttl.deadline_from(current_timestamp_ms());
        let record = CacheEntry::new(payload, deadline).to_bytes();

        let mut index = self.index.lock();
        self.store.put(&key, &record)?;
        match deadline {
            Some(deadline) => {
                index.register(&key, deadline);
                debug!(key = %key, "Set entry expiring at {}", format_deadline(deadline));
            }
            None => {
                index.unregister(&key);
                debug!(key = %key, "Set entry without expiry");
            }
        }

        Ok(())
    }

    // == Get ==
    /// Reads the encoded value for `key`.
    ///
    /// Returns `None` for missing keys and for records past their deadline,
    /// whether or not the sweeper has removed them yet.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read_entry(key)?.map(|entry| entry.payload))
    }

    // == Time To Live ==
    /// Remaining lifetime of a live key.
    pub fn ttl(&self, key: &str) -> Result<Option<Ttl>> {
        let now = current_timestamp_ms();
        Ok(self
            .read_entry(key)?
            .map(|entry| entry.ttl_remaining_at(now)))
    }

    fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        validate_key(key)?;
        let _open = self.gate()?;

        let Some(record) = self.store.get(&self.namespaced(key))? else {
            self.stats.record_miss();
            return Ok(None);
        };

        let entry =
            CacheEntry::from_bytes(&record).ok_or_else(|| CacheError::Corrupt(key.to_string()))?;

        if entry.is_expired() {
            self.stats.record_expired_read();
            return Ok(None);
        }

        self.stats.record_hit();
        Ok(Some(entry))
    }

    // == Delete ==
    /// Removes `key` and its index entry. Deleting a missing key succeeds.
    pub fn del(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let _open = self.gate()?;

        let key = self.namespaced(key);
        let mut index = self.index.lock();
        self.store.delete(&key)?;
        index.unregister(&key);

        debug!(key = %key, "Deleted entry");
        Ok(())
    }

    // == Clear ==
    /// Removes every entry under the prefix and returns how many live entries
    /// were removed.
    ///
    /// Records that expired but were not yet swept are deleted too, without
    /// being counted. Stops at the first store failure. Entries deleted before
    /// the failure stay deleted.
    pub fn clear(&self) -> Result<usize> {
        let _open = self.gate()?;

        let now = current_timestamp_ms();
        let records = self.store.scan(&self.prefix)?;

        let mut removed = 0;
        for (key, record) in records {
            let expired = matches!(
                CacheEntry::peek_deadline(&record),
                Some(Some(deadline)) if now >= deadline
            );

            let mut index = self.index.lock();
            self.store.delete(&key)?;
            index.unregister(&key);
            if !expired {
                removed += 1;
            }
        }

        debug!("Cleared {} entries under prefix '{}'", removed, self.prefix);
        Ok(removed)
    }

    // == Sweep ==
    /// Runs one sweep cycle: deletes every entry whose deadline has passed.
    ///
    /// A failed deletion is logged, counted and left in the index for the next
    /// cycle; it does not stop the cycle. The index mutex is released between
    /// keys so foreground writers are never held up for a whole cycle.
    pub fn sweep(&self) -> Result<SweepReport> {
        let _open = self.gate()?;

        let now = current_timestamp_ms();
        let due = self.index.lock().due_entries(now);
        let report = self.remove_due(due, now);

        self.stats.record_sweep(report.removed, report.failed);
        Ok(report)
    }

    /// Deletes the keys of a `due_entries(now)` snapshot that are still due.
    fn remove_due(&self, due: Vec<String>, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        for key in due {
            let mut index = self.index.lock();

            // Re-set with a later deadline, or deleted, since the snapshot
            match index.deadline_of(&key) {
                Some(deadline) if deadline <= now => {}
                _ => continue,
            }

            match self.store.delete(&key) {
                Ok(()) => {
                    index.unregister(&key);
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to sweep expired entry");
                    report.failed += 1;
                }
            }
        }

        report
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let indexed = self.index.lock().len();
        self.stats.snapshot(indexed)
    }

    // == Close ==
    /// Marks the engine closed and releases the store.
    ///
    /// Waits for in-flight operations. Later operations, including a second
    /// close, fail with `CacheError::Closed`.
    pub fn close(&self) -> Result<()> {
        let mut open = self.open.write();
        if !*open {
            return Err(CacheError::Closed);
        }
        *open = false;

        self.store.close()?;
        info!("Cache closed (prefix '{}')", self.prefix);
        Ok(())
    }
}
