//! Cache Store Module
//!
//! Public cache handles. [`Cache`] is the async API; [`BlockingCache`] wraps
//! it for synchronous callers. Both run the same engine, so they behave
//! identically apart from how the caller waits.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::task;
use tracing::info;

use crate::cache::codec;
use crate::cache::engine::{validate_key, CacheEngine};
use crate::cache::{CacheStats, Ttl};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::storage::{OrderedStore, RedbStore};
use crate::tasks::{spawn_sweeper, SweeperHandle, SweeperState, SweeperStatus};

// == Cache ==
/// TTL-aware key-value cache over an ordered store.
///
/// Owns its store handle and its expiry sweeper. Call [`close`](Self::close)
/// to stop the sweeper and release the store; dropping the cache stops the
/// sweeper too. Share a cache between tasks with an `Arc<Cache>`.
///
/// # Example
/// ```ignore
/// let cache = Cache::open("./data/cache.redb", CacheOptions::default()).await?;
/// cache.set("user:1", &profile, Duration::from_secs(60)).await?;
/// let profile: Option<Profile> = cache.get("user:1").await?;
/// cache.close().await?;
/// ```
pub struct Cache {
    engine: Arc<CacheEngine>,
    /// Taken by `close`
    sweeper: Mutex<Option<SweeperHandle>>,
    sweeper_status: Arc<SweeperStatus>,
}

impl Cache {
    // == Constructors ==
    /// Opens a cache backed by a redb file at `location`.
    ///
    /// Fails with `CacheError::Config` if `location` is empty or the options
    /// are invalid, and with `CacheError::Store` if the file cannot be opened
    /// (including when another cache already has it open).
    pub async fn open(location: impl AsRef<Path>, options: CacheOptions) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        if location.as_os_str().is_empty() {
            return Err(CacheError::Config(
                "a location is required to store data".to_string(),
            ));
        }
        options.validate()?;

        let store_options = options.store.clone();
        let path = location.clone();
        let store = task::spawn_blocking(move || RedbStore::open(&path, &store_options)).await??;

        info!("Opened cache store at {}", location.display());
        Self::with_store(Arc::new(store), options).await
    }

    /// Opens a cache over an existing store.
    ///
    /// Several caches may share one store as long as their prefixes do not
    /// overlap. Closing any of them closes the shared store.
    pub async fn with_store(store: Arc<dyn OrderedStore>, options: CacheOptions) -> Result<Self> {
        options.validate()?;

        let prefix = options.prefix.clone();
        let engine = Arc::new(task::spawn_blocking(move || CacheEngine::open(store, prefix)).await??);

        let sweeper = spawn_sweeper(engine.clone(), options.check_frequency);
        let sweeper_status = sweeper.status();

        info!(
            "Cache ready: prefix='{}', check_frequency={:?}, indexed_keys={}",
            options.prefix,
            options.check_frequency,
            engine.stats().indexed_keys
        );

        Ok(Self {
            engine,
            sweeper: Mutex::new(Some(sweeper)),
            sweeper_status,
        })
    }

    // == Set ==
    /// Stores `value` under `key` with the given TTL, replacing any previous
    /// value and TTL.
    ///
    /// The value is encoded before the store is touched, so an encoding
    /// failure leaves the cache unchanged.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: impl Into<Ttl>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        validate_key(key)?;
        self.engine.ensure_open()?;
        let payload = codec::encode(value)?;

        let ttl = ttl.into();
        let engine = self.engine.clone();
        let key = key.to_string();
        task::spawn_blocking(move || engine.set(&key, payload, ttl)).await?
    }

    // == Get ==
    /// Returns the value stored under `key`, or `None` if it was never set,
    /// was deleted, or has expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;

        let engine = self.engine.clone();
        let key = key.to_string();
        let payload = task::spawn_blocking(move || engine.get(&key)).await??;

        payload.map(|bytes| codec::decode(&bytes)).transpose()
    }

    // == Time To Live ==
    /// Returns the remaining lifetime of `key`, or `None` if it is not live.
    pub async fn ttl(&self, key: &str) -> Result<Option<Ttl>> {
        validate_key(key)?;

        let engine = self.engine.clone();
        let key = key.to_string();
        task::spawn_blocking(move || engine.ttl(&key)).await?
    }

    // == Delete ==
    /// Removes `key`. Succeeds whether or not the key exists.
    pub async fn del(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let engine = self.engine.clone();
        let key = key.to_string();
        task::spawn_blocking(move || engine.del(&key)).await?
    }

    // == Clear ==
    /// Removes every entry under this cache's prefix and returns how many
    /// live entries were removed.
    ///
    /// Expired records awaiting the sweeper are removed as well but not
    /// counted. On a store failure the entries already removed stay removed.
    pub async fn clear(&self) -> Result<usize> {
        let engine = self.engine.clone();
        task::spawn_blocking(move || engine.clear()).await?
    }

    // == Sweep ==
    /// Runs one sweep cycle now and returns how many entries it removed.
    pub async fn sweep_now(&self) -> Result<u64> {
        let engine = self.engine.clone();
        let report = task::spawn_blocking(move || engine.sweep()).await??;
        Ok(report.removed)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }

    pub fn sweeper_state(&self) -> SweeperState {
        self.sweeper_status.get()
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    // == Close ==
    /// Stops the sweeper, waits for any running cycle, then releases the
    /// store. Every later operation fails with `CacheError::Closed`.
    pub async fn close(&self) -> Result<()> {
        self.engine.ensure_open()?;

        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }

        let engine = self.engine.clone();
        task::spawn_blocking(move || engine.close()).await?
    }
}

// == Blocking Cache ==
/// Synchronous wrapper around [`Cache`].
///
/// Owns a small tokio runtime that also drives the sweeper. Do not call it
/// from inside another tokio runtime; use [`Cache`] there.
pub struct BlockingCache {
    // Declared before the runtime so it drops first
    cache: Cache,
    runtime: Runtime,
}

impl BlockingCache {
    /// Blocking counterpart of [`Cache::open`].
    pub fn open(location: impl AsRef<Path>, options: CacheOptions) -> Result<Self> {
        let runtime = Self::runtime()?;
        let cache = runtime.block_on(Cache::open(location, options))?;
        Ok(Self { cache, runtime })
    }

    /// Blocking counterpart of [`Cache::with_store`].
    pub fn with_store(store: Arc<dyn OrderedStore>, options: CacheOptions) -> Result<Self> {
        let runtime = Self::runtime()?;
        let cache = runtime.block_on(Cache::with_store(store, options))?;
        Ok(Self { cache, runtime })
    }

    fn runtime() -> Result<Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ttl-cache")
            .enable_all()
            .build()
            .map_err(|e| CacheError::Internal(format!("failed to start runtime: {}", e)))
    }

    pub fn set<T>(&self, key: &str, value: &T, ttl: impl Into<Ttl>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.runtime.block_on(self.cache.set(key, value, ttl))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.runtime.block_on(self.cache.get(key))
    }

    pub fn ttl(&self, key: &str) -> Result<Option<Ttl>> {
        self.runtime.block_on(self.cache.ttl(key))
    }

    pub fn del(&self, key: &str) -> Result<()> {
        self.runtime.block_on(self.cache.del(key))
    }

    pub fn clear(&self) -> Result<usize> {
        self.runtime.block_on(self.cache.clear())
    }

    pub fn sweep_now(&self) -> Result<u64> {
        self.runtime.block_on(self.cache.sweep_now())
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn sweeper_state(&self) -> SweeperState {
        self.cache.sweeper_state()
    }

    pub fn is_closed(&self) -> bool {
        self.cache.is_closed()
    }

    pub fn close(&self) -> Result<()> {
        self.runtime.block_on(self.cache.close())
    }
}
