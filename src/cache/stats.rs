//! Cache Statistics Module
//!
//! Tracks read outcomes and sweeper activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads that returned a value
    pub hits: u64,
    /// Reads that returned nothing (never set, deleted or expired)
    pub misses: u64,
    /// Misses caused by an expired record the sweeper had not removed yet
    pub expired_reads: u64,
    /// Entries removed by the sweeper
    pub swept: u64,
    /// Completed sweep cycles
    pub sweep_cycles: u64,
    /// Per-key deletions that failed during sweeps
    pub sweep_failures: u64,
    /// Keys currently tracked by the expiry index
    pub indexed_keys: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters shared by foreground operations and the sweeper.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired_reads: AtomicU64,
    swept: AtomicU64,
    sweep_cycles: AtomicU64,
    sweep_failures: AtomicU64,
}

impl StatsCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a read that found an expired record. Also counts as a miss.
    pub fn record_expired_read(&self) {
        self.expired_reads.fetch_add(1, Ordering::Relaxed);
        self.record_miss();
    }

    pub fn record_sweep(&self, removed: u64, failed: u64) {
        self.sweep_cycles.fetch_add(1, Ordering::Relaxed);
        self.swept.fetch_add(removed, Ordering::Relaxed);
        self.sweep_failures.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn snapshot(&self, indexed_keys: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_reads: self.expired_reads.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
            indexed_keys,
        }
    }
}
