//! Expiry Index Module
//!
//! Tracks the deadline of every TTL-bearing key so the sweeper can find
//! expired keys without scanning the whole store.

use std::collections::{BTreeSet, HashMap};

// == Expiry Index ==
/// Ordered index of `(deadline, key)` pairs.
///
/// Each key has at most one deadline: registering a key again replaces its
/// previous entry. Deadlines are Unix milliseconds. Ties between equal
/// deadlines are broken by key order.
///
/// The index is not synchronized; the cache core keeps it behind a mutex.
#[derive(Debug, Default)]
pub(crate) struct ExpiryIndex {
    /// Pairs sorted by deadline, then key
    by_deadline: BTreeSet<(u64, String)>,
    /// Current deadline of each indexed key
    by_key: HashMap<String, u64>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Inserts or replaces the deadline for `key`.
    pub fn register(&mut self, key: &str, deadline: u64) {
        if let Some(previous) = self.by_key.insert(key.to_string(), deadline) {
            if previous == deadline {
                return;
            }
            self.by_deadline.remove(&(previous, key.to_string()));
        }
        self.by_deadline.insert((deadline, key.to_string()));
    }

    // == Unregister ==
    /// Removes `key` from the index, returning its deadline if it had one.
    pub fn unregister(&mut self, key: &str) -> Option<u64> {
        let deadline = self.by_key.remove(key)?;
        self.by_deadline.remove(&(deadline, key.to_string()));
        Some(deadline)
    }

    // == Due Entries ==
    /// Returns every key whose deadline is at or before `now`, earliest first.
    ///
    /// The index is left untouched; callers unregister keys as they remove them.
    pub fn due_entries(&self, now: u64) -> Vec<String> {
        self.by_deadline
            .iter()
            .take_while(|(deadline, _)| *deadline <= now)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Current deadline of `key`, if indexed.
    pub fn deadline_of(&self, key: &str) -> Option<u64> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}
