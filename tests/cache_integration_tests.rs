//! Integration Tests for the Cache
//!
//! Exercises the public API end to end against real redb files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::EnvFilter;
use ttl_cache::{BlockingCache, Cache, CacheError, CacheOptions, StoreError, SweeperState, Ttl};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "ttl_cache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn cache_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join("cache.redb")
}

/// Options with a sweeper slow enough to never run during a test
fn lazy_options() -> CacheOptions {
    CacheOptions::default().with_check_frequency(Duration::from_secs(60))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
    admin: bool,
    expires_hint: Option<String>,
}

// == Basic Operations ==

#[tokio::test]
async fn test_set_get_clear_scenario() -> anyhow::Result<()> {
    init_tracing();
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), CacheOptions::default()).await?;

    cache.set("a", "A", Ttl::Never).await?;
    assert_eq!(cache.get::<String>("a").await?.as_deref(), Some("A"));

    // -1 is the no-expiry sentinel
    cache.set("a", "A", Ttl::from_secs(-1)).await?;
    assert_eq!(cache.ttl("a").await?, Some(Ttl::Never));

    cache.set("b", "B", Ttl::Never).await?;
    assert_eq!(cache.clear().await?, 2);

    assert_eq!(cache.get::<String>("a").await?, None);
    assert_eq!(cache.get::<String>("b").await?, None);

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_falsy_and_nested_values() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), CacheOptions::default()).await?;

    cache.set("zero", &0, Ttl::Never).await?;
    cache.set("false", &false, Ttl::Never).await?;
    cache.set("null", &Value::Null, Ttl::Never).await?;

    assert_eq!(cache.get::<i64>("zero").await?, Some(0));
    assert_eq!(cache.get::<bool>("false").await?, Some(false));
    assert_eq!(cache.get::<Value>("null").await?, Some(Value::Null));

    let nested = json!({"abc": "ABC", "inner": {"n": 0, "ok": false, "none": null}});
    cache.set("nested", &nested, Ttl::Never).await?;
    assert_eq!(cache.get::<Value>("nested").await?, Some(nested));

    let session = Session {
        user_id: 7,
        roles: vec!["reader".into(), "writer".into()],
        admin: false,
        expires_hint: None,
    };
    cache.set("session:7", &session, Duration::from_secs(60)).await?;
    assert_eq!(cache.get::<Session>("session:7").await?, Some(session));

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_delete_idempotent() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), CacheOptions::default()).await?;

    cache.set("k", "v", Ttl::from_secs(30)).await?;
    assert_ok!(cache.del("k").await);
    assert_ok!(cache.del("k").await);
    assert_ok!(cache.del("never-set").await);
    assert_eq!(cache.get::<String>("k").await?, None);
    assert_eq!(cache.stats().indexed_keys, 0);

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_keys_rejected() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), CacheOptions::default()).await?;

    let err = assert_err!(cache.set("", "v", Ttl::Never).await);
    assert!(matches!(err, CacheError::InvalidKey(_)));
    let err = assert_err!(cache.get::<String>("").await);
    assert!(matches!(err, CacheError::InvalidKey(_)));
    let err = assert_err!(cache.del("").await);
    assert!(matches!(err, CacheError::InvalidKey(_)));

    cache.close().await?;
    Ok(())
}

// == Expiry ==

#[tokio::test]
async fn test_lazy_expiry_before_sweep() -> anyhow::Result<()> {
    init_tracing();
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), lazy_options()).await?;

    cache.set("ttl", "x", Ttl::from_secs(1)).await?;
    assert_eq!(cache.get::<String>("ttl").await?.as_deref(), Some("x"));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // The sweeper has not run yet, the read must still miss
    assert_eq!(cache.stats().sweep_cycles, 0);
    assert_eq!(cache.get::<String>("ttl").await?, None);
    assert_eq!(cache.ttl("ttl").await?, None);
    assert_eq!(cache.stats().expired_reads, 2);

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_zero_ttl_never_readable() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), lazy_options()).await?;

    cache.set("zero-ttl", "x", Ttl::from_secs(0)).await?;
    assert_eq!(cache.get::<String>("zero-ttl").await?, None);
    assert_eq!(cache.sweep_now().await?, 1);

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_no_expiry_entries_survive_sweeps() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let options = CacheOptions::default().with_check_frequency(Duration::from_millis(50));
    let cache = Cache::open(cache_path(&tmp), options).await?;

    cache.set("forever", "x", Ttl::Never).await?;
    cache.set("brief", "y", Duration::from_millis(50)).await?;

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(cache.get::<String>("forever").await?.as_deref(), Some("x"));
    assert_eq!(cache.get::<String>("brief").await?, None);

    let stats = cache.stats();
    assert!(stats.sweep_cycles >= 1);
    assert_eq!(stats.swept, 1);
    assert_eq!(stats.indexed_keys, 0);

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_overwrite_replaces_ttl() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), lazy_options()).await?;

    cache.set("k", "v1", Duration::from_millis(100)).await?;
    cache.set("k", "v2", Duration::from_secs(3600)).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.sweep_now().await?, 0);
    assert_eq!(cache.get::<String>("k").await?.as_deref(), Some("v2"));
    assert_eq!(cache.stats().indexed_keys, 1);

    cache.close().await?;
    Ok(())
}

// == Persistence ==

#[tokio::test]
async fn test_reopen_rebuilds_expiry_index() -> anyhow::Result<()> {
    init_tracing();
    let tmp = TempDir::new()?;
    let path = cache_path(&tmp);

    let cache = Cache::open(&path, lazy_options()).await?;
    cache.set("keep", "forever", Ttl::Never).await?;
    cache.set("short", "soon gone", Duration::from_millis(100)).await?;
    cache.set("long", "later", Duration::from_secs(3600)).await?;
    cache.close().await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let cache = Cache::open(&path, lazy_options()).await?;
    assert_eq!(cache.stats().indexed_keys, 2);
    assert_eq!(cache.get::<String>("keep").await?.as_deref(), Some("forever"));
    assert_eq!(cache.get::<String>("short").await?, None);

    assert_eq!(cache.sweep_now().await?, 1);
    assert_eq!(cache.stats().indexed_keys, 1);
    assert_eq!(cache.get::<String>("long").await?.as_deref(), Some("later"));

    cache.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_clear_is_scoped_to_prefix() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let path = cache_path(&tmp);

    let plain = Cache::open(&path, CacheOptions::default()).await?;
    plain.set("outside", "keep me", Ttl::Never).await?;
    plain.close().await?;

    let scoped = Cache::open(&path, CacheOptions::default().with_prefix("ns:")).await?;
    scoped.set("a", "A", Ttl::Never).await?;
    scoped.set("b", "B", Duration::from_secs(60)).await?;
    assert_eq!(scoped.get::<String>("outside").await?, None);
    assert_eq!(scoped.clear().await?, 2);
    scoped.close().await?;

    let plain = Cache::open(&path, CacheOptions::default()).await?;
    assert_eq!(
        plain.get::<String>("outside").await?.as_deref(),
        Some("keep me")
    );
    assert_eq!(plain.get::<String>("ns:a").await?, None);
    plain.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_single_cache_per_location() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let path = cache_path(&tmp);

    let first = Cache::open(&path, CacheOptions::default()).await?;
    let second = Cache::open(&path, CacheOptions::default()).await;
    assert!(matches!(second, Err(CacheError::Store(StoreError::Redb(_)))));

    first.close().await?;

    // Released on close
    let third = Cache::open(&path, CacheOptions::default()).await?;
    third.close().await?;
    Ok(())
}

// == Lifecycle ==

#[tokio::test]
async fn test_open_requires_location() {
    let result = Cache::open("", CacheOptions::default()).await;
    assert!(matches!(result, Err(CacheError::Config(_))));
}

#[tokio::test]
async fn test_operations_after_close() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let cache = Cache::open(cache_path(&tmp), CacheOptions::default()).await?;
    assert_eq!(cache.sweeper_state(), SweeperState::Idle);

    cache.close().await?;

    assert!(cache.is_closed());
    assert_eq!(cache.sweeper_state(), SweeperState::Stopped);
    assert!(matches!(cache.set("k", "v", Ttl::Never).await, Err(CacheError::Closed)));
    assert!(matches!(cache.get::<String>("k").await, Err(CacheError::Closed)));
    assert!(matches!(cache.del("k").await, Err(CacheError::Closed)));
    assert!(matches!(cache.clear().await, Err(CacheError::Closed)));
    assert!(matches!(cache.sweep_now().await, Err(CacheError::Closed)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_with_sweeper() -> anyhow::Result<()> {
    init_tracing();
    let tmp = TempDir::new()?;
    let options = CacheOptions::default().with_check_frequency(Duration::from_millis(20));
    let cache = Arc::new(Cache::open(cache_path(&tmp), options).await?);

    let mut handles = Vec::new();
    for worker in 0..4 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                let key = format!("w{}:{}", worker, i);
                cache.set(&key, &i, Duration::from_millis(30)).await?;
                cache.set(&format!("{}:pinned", key), &i, Ttl::Never).await?;
            }
            Ok::<_, CacheError>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;

    for worker in 0..4 {
        for i in 0..25 {
            let key = format!("w{}:{}", worker, i);
            assert_eq!(cache.get::<i32>(&key).await?, None);
            assert_eq!(cache.get::<i32>(&format!("{}:pinned", key)).await?, Some(i));
        }
    }

    let stats = cache.stats();
    assert_eq!(stats.indexed_keys, 0);
    assert_eq!(stats.swept, 100);

    cache.close().await?;
    Ok(())
}

// == Blocking Adapter ==

#[test]
fn test_blocking_cache_matches_async_semantics() -> anyhow::Result<()> {
    init_tracing();
    let tmp = TempDir::new()?;
    let cache = BlockingCache::open(cache_path(&tmp), lazy_options())?;

    cache.set("a", "A", Ttl::Never)?;
    cache.set("zero", &0, Ttl::Never)?;
    cache.set("ttl", "x", Duration::from_millis(100))?;

    assert_eq!(cache.get::<String>("a")?.as_deref(), Some("A"));
    assert_eq!(cache.get::<i32>("zero")?, Some(0));
    assert_eq!(cache.get::<String>("ttl")?.as_deref(), Some("x"));

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(cache.get::<String>("ttl")?, None);
    assert_eq!(cache.sweep_now()?, 1);

    cache.del("a")?;
    cache.del("a")?;
    assert_eq!(cache.get::<String>("a")?, None);
    assert!(matches!(cache.get::<String>(""), Err(CacheError::InvalidKey(_))));

    assert_eq!(cache.clear()?, 1);
    cache.close()?;
    assert!(matches!(cache.get::<String>("zero"), Err(CacheError::Closed)));
    Ok(())
}
