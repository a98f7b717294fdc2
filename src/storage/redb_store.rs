//! redb-backed ordered store.

use std::path::Path;

use parking_lot::RwLock;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use super::{OrderedStore, StoreResult};
use crate::config::StoreOptions;
use crate::error::StoreError;

/// Table holding every cache record, keyed by namespaced key
const CACHE_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("cache");

// == Redb Store ==
/// Persistent ordered store in a single redb file.
///
/// Each call runs in its own redb transaction, so every `put` and `delete`
/// is durable once it returns.
pub struct RedbStore {
    /// `None` once the store has been closed
    db: RwLock<Option<Database>>,
}

impl RedbStore {
    /// Opens or creates the database at `path`.
    ///
    /// Creates parent directories if needed and initializes the cache table
    /// on first open. redb refuses to open a file that is already open, which
    /// keeps a single writer per location.
    pub fn open<P: AsRef<Path>>(path: P, options: &StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self::create(path, options)?;
        debug!("Opened redb store at {}", path.display());

        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }

    fn create(path: &Path, options: &StoreOptions) -> Result<Database, redb::Error> {
        let mut builder = Database::builder();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = builder.create(path)?;

        // Create the table up front so read transactions can always open it
        let write_txn = db.begin_write()?;
        {
            let _table = write_txn.open_table(CACHE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(db)
    }

    /// Runs `f` against the open database, or fails if the store is closed.
    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, redb::Error>,
    ) -> StoreResult<T> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(f(db)?)
    }
}

impl OrderedStore for RedbStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CACHE_TABLE)?;
            let value = table.get(key)?.map(|guard| guard.value().to_vec());
            Ok(value)
        })
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                table.insert(key, value)?;
            }
            write_txn.commit()?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                table.remove(key)?;
            }
            write_txn.commit()?;
            Ok(())
        })
    }

    fn scan(&self, prefix: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CACHE_TABLE)?;

            let mut pairs = Vec::new();
            for item in table.range(prefix..)? {
                let (key, value) = item?;
                let key = key.value();
                // Keys are sorted, so the first miss ends the prefix range
                if !key.starts_with(prefix) {
                    break;
                }
                pairs.push((key.to_string(), value.value().to_vec()));
            }
            Ok(pairs)
        })
    }

    fn close(&self) -> StoreResult<()> {
        // Dropping the Database flushes and releases the file lock
        if self.db.write().take().is_some() {
            debug!("Closed redb store");
        }
        Ok(())
    }
}
