//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use crate::single_flight::DEFAULT_SHARD_COUNT;
use flightcache_codec::{Codec, Compactor, Serializer};
use serde::{Deserialize, Serialize};

/// Default time to live, in seconds.
pub const DEFAULT_EXPIRE_SECS: i64 = 300;

/// Backing store selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store
    Memory {
        /// Optional cap on live entries
        #[serde(default)]
        max_entries: Option<usize>,
    },

    /// Caches nothing
    None,

    /// Redis store
    Redis {
        /// Connection URL (e.g., "redis://localhost:6379")
        url: String,

        /// Key prefix for all cache keys
        #[serde(default)]
        key_prefix: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory { max_entries: None }
    }
}

/// Request coalescing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleFlightMode {
    /// Sharded single-flight engine
    #[default]
    Sharded,
    /// Every miss runs its own load
    Disabled,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Default serializer
    pub serializer: Serializer,

    /// Default compactor
    pub compactor: Compactor,

    /// Default TTL in seconds; zero or less never expires
    pub expire_secs: i64,

    /// Route store faults to the loader instead of returning them
    pub ignore_cache_fault: bool,

    /// Request coalescing mode
    pub single_flight: SingleFlightMode,

    /// Number of single-flight shards
    pub shard_count: usize,

    /// Backing store
    pub store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            serializer: Serializer::default(),
            compactor: Compactor::default(),
            expire_secs: DEFAULT_EXPIRE_SECS,
            ignore_cache_fault: false,
            single_flight: SingleFlightMode::default(),
            shard_count: DEFAULT_SHARD_COUNT,
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration backed by the in-process store.
    ///
    /// # Examples
    ///
    /// ```
    /// use flightcache_cache::CacheConfig;
    ///
    /// let config = CacheConfig::memory().with_expire_secs(60);
    /// assert_eq!(config.expire_secs, 60);
    /// ```
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a configuration backed by Redis.
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store: StoreConfig::Redis {
                url: url.into(),
                key_prefix: None,
            },
            ..Self::default()
        }
    }

    /// Set the default serializer.
    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Set the default compactor.
    pub fn with_compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = compactor;
        self
    }

    /// Set the default TTL in seconds.
    pub fn with_expire_secs(mut self, secs: i64) -> Self {
        self.expire_secs = secs;
        self
    }

    /// Set the store fault policy.
    pub fn with_ignore_cache_fault(mut self, ignore: bool) -> Self {
        self.ignore_cache_fault = ignore;
        self
    }

    /// Set the request coalescing mode.
    pub fn with_single_flight(mut self, mode: SingleFlightMode) -> Self {
        self.single_flight = mode;
        self
    }

    /// Set the single-flight shard count.
    pub fn with_shard_count(mut self, count: usize) -> Self {
        self.shard_count = count;
        self
    }

    /// Set the backing store.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Set the key prefix; only meaningful for the Redis store.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        if let StoreConfig::Redis { key_prefix, .. } = &mut self.store {
            *key_prefix = Some(prefix.into());
        }
        self
    }

    /// Default codec described by this configuration.
    pub fn codec(&self) -> Codec {
        Codec::new(self.serializer, self.compactor)
    }

    /// Normalize and check the configuration.
    ///
    /// A TTL below one second becomes 0 (never expires). The shard count
    /// must be a power of two when coalescing is enabled, and a Redis store
    /// needs a URL.
    pub fn validate(mut self) -> CacheResult<Self> {
        if self.expire_secs < 1 {
            self.expire_secs = 0;
        }

        if self.single_flight == SingleFlightMode::Sharded
            && (self.shard_count == 0 || !self.shard_count.is_power_of_two())
        {
            return Err(CacheError::config(format!(
                "shard_count must be a power of two, got {}",
                self.shard_count
            )));
        }

        match &self.store {
            StoreConfig::Redis { url, .. } if url.trim().is_empty() => {
                return Err(CacheError::config("redis store requires a url"));
            }
            StoreConfig::Memory {
                max_entries: Some(0),
            } => {
                return Err(CacheError::config("memory max_entries must be at least 1"));
            }
            _ => {}
        }

        Ok(self)
    }
}
