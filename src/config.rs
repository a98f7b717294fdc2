//! Configuration Module
//!
//! Handles loading and validating cache options from code, environment
//! variables or JSON.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{CacheError, Result};

/// Default sweeper interval in seconds
pub const DEFAULT_CHECK_FREQUENCY_SECS: u64 = 15;

/// Tuning knobs handed straight to the underlying store.
///
/// The cache itself never looks at these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// redb page cache size in bytes, `None` keeps redb's default
    pub cache_size: Option<usize>,
}

/// Cache configuration parameters.
///
/// All values have sensible defaults and can be loaded from environment
/// variables or a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Interval between background sweep cycles
    #[serde(rename = "check_frequency_secs", deserialize_with = "duration_from_secs")]
    pub check_frequency: Duration,
    /// Namespace prepended to every key
    pub prefix: String,
    /// Pass-through store tuning
    pub store: StoreOptions,
}

impl CacheOptions {
    /// Creates options by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CHECK_FREQUENCY` - Sweep interval in seconds (default: 15)
    /// - `CACHE_PREFIX` - Key namespace (default: empty)
    /// - `CACHE_STORE_CACHE_SIZE` - redb page cache in bytes (default: redb's own)
    pub fn from_env() -> Self {
        Self {
            check_frequency: Duration::from_secs(
                env::var("CACHE_CHECK_FREQUENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_CHECK_FREQUENCY_SECS),
            ),
            prefix: env::var("CACHE_PREFIX").unwrap_or_default(),
            store: StoreOptions {
                cache_size: env::var("CACHE_STORE_CACHE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
        }
    }

    /// Parses options from a JSON object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| CacheError::Config(format!("unreadable options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_check_frequency(mut self, check_frequency: Duration) -> Self {
        self.check_frequency = check_frequency;
        self
    }

    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.store.cache_size = Some(bytes);
        self
    }

    /// Rejects options the sweeper cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.check_frequency.is_zero() {
            return Err(CacheError::Config(
                "check frequency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            check_frequency: Duration::from_secs(DEFAULT_CHECK_FREQUENCY_SECS),
            prefix: String::new(),
            store: StoreOptions::default(),
        }
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
