//! In-memory ordered store.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;

use super::{OrderedStore, StoreResult};
use crate::error::StoreError;

// == Memory Store ==
/// Non-persistent ordered store backed by a `BTreeMap`.
///
/// Behaves like [`RedbStore`](super::RedbStore) minus durability. Several
/// caches with different prefixes can share one instance through an `Arc`.
#[derive(Debug)]
pub struct MemoryStore {
    /// `None` once the store has been closed
    entries: RwLock<Option<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Number of stored pairs, across all prefixes.
    pub fn len(&self) -> usize {
        self.entries.read().as_ref().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut guard = self.entries.write();
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let mut guard = self.entries.write();
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        entries.remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let guard = self.entries.read();
        let entries = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn close(&self) -> StoreResult<()> {
        self.entries.write().take();
        Ok(())
    }
}
