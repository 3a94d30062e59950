//! Named cache instances owned by the application.
//!
//! A [`CacheRegistry`] maps names to configurations and builds each instance
//! the first time it is asked for. Shutdown is explicit: call
//! [`CacheRegistry::close_all`] once.

use crate::batch::BatchError;
use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, error};

/// Name of the instance returned by [`CacheRegistry::default_cache`].
pub const DEFAULT_CACHE_NAME: &str = "default";

type Slot = Arc<OnceCell<Arc<Cache>>>;

/// Registry of lazily built, named caches.
///
/// # Examples
///
/// ```
/// use flightcache_cache::CacheRegistry;
///
/// # async fn example() -> flightcache_cache::CacheResult<()> {
/// let registry = CacheRegistry::from_toml_str(
///     r#"
///     [default]
///     expire_secs = 60
///
///     [sessions]
///     compactor = "raw"
///     store = { type = "memory", max_entries = 10000 }
///     "#,
/// )?;
///
/// let sessions = registry.get("sessions").await?;
/// assert_eq!(sessions.name(), "sessions");
///
/// registry.close_all().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CacheRegistry {
    configs: RwLock<HashMap<String, CacheConfig>>,
    slots: Mutex<HashMap<String, Slot>>,
    closed: AtomicBool,
}

impl CacheRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a TOML document with one table per cache.
    pub fn from_toml_str(source: &str) -> CacheResult<Self> {
        let configs: HashMap<String, CacheConfig> = toml::from_str(source)
            .map_err(|e| CacheError::config(format!("invalid cache configuration: {}", e)))?;

        let registry = Self::new();
        for (name, config) in configs {
            registry.register(name, config);
        }
        Ok(registry)
    }

    /// Set the configuration for `name`.
    ///
    /// An instance that is already built keeps its old configuration.
    pub fn register(&self, name: impl Into<String>, config: CacheConfig) {
        self.configs.write().insert(name.into(), config);
    }

    /// Add an already built cache under `name`.
    ///
    /// Fails if an instance by that name is already built.
    pub fn insert(&self, name: impl Into<String>, cache: Cache) -> CacheResult<Arc<Cache>> {
        let name = name.into();
        let cache = Arc::new(cache.with_name(name.clone()));

        let mut slots = self.slots.lock();
        self.ensure_open()?;
        slots
            .entry(name.clone())
            .or_default()
            .set(Arc::clone(&cache))
            .map_err(|_| CacheError::config(format!("cache `{}` is already built", name)))?;
        Ok(cache)
    }

    /// Configuration that `name` would be built with.
    ///
    /// Names without a registered configuration use the default one.
    pub fn config(&self, name: &str) -> CacheConfig {
        self.configs.read().get(name).cloned().unwrap_or_default()
    }

    /// Get the cache called `name`, building it on first use.
    ///
    /// Concurrent first calls build one instance. A failed build is
    /// returned to the caller and retried on the next call.
    pub async fn get(&self, name: &str) -> CacheResult<Arc<Cache>> {
        let slot = self.slot(name)?;
        self.init_slot(name, &slot).await
    }

    /// Get the cache called [`DEFAULT_CACHE_NAME`].
    pub async fn default_cache(&self) -> CacheResult<Arc<Cache>> {
        self.get(DEFAULT_CACHE_NAME).await
    }

    /// Names of the instances built so far, sorted.
    pub fn built(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Close every built instance once. Later calls to [`CacheRegistry::get`]
    /// fail with [`CacheError::Closed`].
    ///
    /// Close failures are reported per instance name.
    pub async fn close_all(&self) -> CacheResult<()> {
        let caches: Vec<(String, Arc<Cache>)> = {
            let mut slots = self.slots.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            slots
                .drain()
                .filter_map(|(name, slot)| slot.get().cloned().map(|cache| (name, cache)))
                .collect()
        };

        debug!(count = caches.len(), "Closing cache instances");

        let mut outcomes = Vec::with_capacity(caches.len());
        for (name, cache) in caches {
            let result = cache.close().await;
            if let Err(e) = &result {
                error!(cache = %name, error = %e, "Failed to close cache");
            }
            outcomes.push((name, result));
        }

        BatchError::collect(outcomes)
    }

    /// Slot for `name`, checked against `closed` under the same lock that
    /// [`CacheRegistry::close_all`] drains with.
    fn slot(&self, name: &str) -> CacheResult<Slot> {
        let mut slots = self.slots.lock();
        self.ensure_open()?;
        Ok(Arc::clone(slots.entry(name.to_string()).or_default()))
    }

    async fn init_slot(&self, name: &str, slot: &Slot) -> CacheResult<Arc<Cache>> {
        let cache = slot
            .get_or_try_init(|| async {
                debug!(cache = %name, "Building cache instance");
                let cache = Cache::from_config(self.config(name))
                    .await
                    .inspect_err(|e| error!(cache = %name, error = %e, "Failed to build cache"))?;
                Ok::<_, CacheError>(Arc::new(cache.with_name(name)))
            })
            .await?;

        // close_all may have drained this slot while the build was running
        if self.closed.load(Ordering::Acquire) {
            cache.close().await?;
            return Err(CacheError::Closed);
        }
        Ok(Arc::clone(cache))
    }

    fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}
