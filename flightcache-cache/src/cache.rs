//! The cache facade.
//!
//! Read paths live in `load.rs`, write paths in `write.rs`; this file holds
//! construction, deletion and lifecycle.

use crate::batch::BatchError;
use crate::config::{CacheConfig, SingleFlightMode, StoreConfig};
use crate::error::{CacheError, CacheResult};
use crate::options::CacheDefaults;
use crate::single_flight::{NoSingleFlight, ShardedSingleFlight, SingleFlight};
use crate::store::{CacheStore, MemoryStore, NoStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Cache-aside facade over a store, a codec and a single-flight engine.
///
/// `Cache` is `Send + Sync`; share it between tasks behind an `Arc`.
///
/// # Examples
///
/// ```
/// use flightcache_cache::{Cache, CacheConfig, CallOptions, MemoryStore};
///
/// # async fn example() -> flightcache_cache::CacheResult<()> {
/// let cache = Cache::new(MemoryStore::new(), CacheConfig::default())?;
///
/// cache.set("greeting", &"hello".to_string(), CallOptions::new()).await?;
/// let value: String = cache.get("greeting", CallOptions::new()).await?;
/// assert_eq!(value, "hello");
/// # Ok(())
/// # }
/// ```
pub struct Cache {
    pub(crate) name: String,
    pub(crate) store: Arc<dyn CacheStore>,
    pub(crate) single_flight: Arc<dyn SingleFlight>,
    pub(crate) defaults: CacheDefaults,
    pub(crate) ignore_cache_fault: bool,
    closed: AtomicBool,
}

impl Cache {
    /// Create a cache over `store`, configured by `config`.
    ///
    /// The `store` section of `config` is ignored.
    pub fn new<S>(store: S, config: CacheConfig) -> CacheResult<Self>
    where
        S: CacheStore + 'static,
    {
        Self::with_store(Arc::new(store), config)
    }

    /// Create a cache over a shared store.
    pub fn with_store(store: Arc<dyn CacheStore>, config: CacheConfig) -> CacheResult<Self> {
        let config = config.validate()?;

        let single_flight: Arc<dyn SingleFlight> = match config.single_flight {
            SingleFlightMode::Sharded => Arc::new(ShardedSingleFlight::new(config.shard_count)?),
            SingleFlightMode::Disabled => Arc::new(NoSingleFlight),
        };

        debug!(
            serializer = %config.serializer,
            compactor = %config.compactor,
            expire_secs = config.expire_secs,
            ignore_cache_fault = config.ignore_cache_fault,
            single_flight = ?config.single_flight,
            "Creating cache"
        );

        Ok(Self {
            name: "default".to_string(),
            store,
            single_flight,
            defaults: CacheDefaults {
                codec: config.codec(),
                expire_secs: config.expire_secs,
            },
            ignore_cache_fault: config.ignore_cache_fault,
            closed: AtomicBool::new(false),
        })
    }

    /// Create a cache and its store from `config`.
    pub async fn from_config(config: CacheConfig) -> CacheResult<Self> {
        let config = config.validate()?;

        let store: Arc<dyn CacheStore> = match &config.store {
            StoreConfig::Memory { max_entries: None } => Arc::new(MemoryStore::new()),
            StoreConfig::Memory {
                max_entries: Some(max),
            } => Arc::new(MemoryStore::with_max_entries(*max)),
            StoreConfig::None => Arc::new(NoStore),
            #[cfg(feature = "redis")]
            StoreConfig::Redis { url, key_prefix } => {
                Arc::new(crate::store::RedisStore::connect(url, key_prefix.clone()).await?)
            }
            #[cfg(not(feature = "redis"))]
            StoreConfig::Redis { .. } => {
                return Err(CacheError::config(
                    "redis store requested but the `redis` feature is disabled",
                ));
            }
        };

        Self::with_store(store, config)
    }

    /// Set the instance name used in log events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance defaults applied to every call.
    pub fn defaults(&self) -> CacheDefaults {
        self.defaults
    }

    /// Whether store faults are routed to the loader.
    pub fn ignores_cache_fault(&self) -> bool {
        self.ignore_cache_fault
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Delete `keys`.
    ///
    /// Deleting absent keys succeeds. Failures are reported per key.
    pub async fn del(&self, keys: &[&str]) -> CacheResult<()> {
        self.ensure_open()?;
        if keys.is_empty() {
            return Ok(());
        }

        let results = self.store.delete_many(keys).await;
        debug!(cache = %self.name, keys = keys.len(), "Deleted keys");

        BatchError::collect(
            keys.iter()
                .map(|key| key.to_string())
                .zip(results),
        )
    }

    /// Close the store. Later operations fail with [`CacheError::Closed`].
    ///
    /// Closing twice is a no-op.
    pub async fn close(&self) -> CacheResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(cache = %self.name, "Closing cache");
        self.store.close().await
    }

    /// Whether [`Cache::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> CacheResult<()> {
        if self.is_closed() {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("ignore_cache_fault", &self.ignore_cache_fault)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CallOptions;

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Cache::new(MemoryStore::new(), CacheConfig::default().with_shard_count(3))
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_defaults_come_from_config() {
        let cache = Cache::new(
            NoStore,
            CacheConfig::default()
                .with_expire_secs(-10)
                .with_ignore_cache_fault(true),
        )
        .unwrap()
        .with_name("users");

        assert_eq!(cache.name(), "users");
        assert_eq!(cache.defaults().expire_secs, 0);
        assert!(cache.ignores_cache_fault());
    }

    #[tokio::test]
    async fn test_from_config_memory() {
        let cache = Cache::from_config(CacheConfig::memory()).await.unwrap();
        cache.set("k", &1_u32, CallOptions::new()).await.unwrap();
        let value: u32 = cache.get("k", CallOptions::new()).await.unwrap();
        assert_eq!(value, 1);
    }

    #[cfg(not(feature = "redis"))]
    #[tokio::test]
    async fn test_from_config_redis_without_feature() {
        let err = Cache::from_config(CacheConfig::redis("redis://localhost:6379"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[tokio::test]
    async fn test_del_reports_nothing_for_absent_keys() {
        let cache = Cache::new(MemoryStore::new(), CacheConfig::default()).unwrap();
        assert!(cache.del(&[]).await.is_ok());
        assert!(cache.del(&["missing", "also-missing"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_cache_rejects_operations() {
        let cache = Cache::new(MemoryStore::new(), CacheConfig::default()).unwrap();
        cache.close().await.unwrap();
        cache.close().await.unwrap();

        assert!(cache.is_closed());
        assert!(matches!(
            cache.get::<u32>("k", CallOptions::new()).await,
            Err(CacheError::Closed)
        ));
        assert!(matches!(
            cache.set("k", &1_u32, CallOptions::new()).await,
            Err(CacheError::Closed)
        ));
        assert!(matches!(cache.del(&["k"]).await, Err(CacheError::Closed)));
    }
}
