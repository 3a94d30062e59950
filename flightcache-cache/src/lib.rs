//! Cache-aside orchestration with request coalescing.
//!
//! A [`Cache`] returns values from a [`CacheStore`] or, on a miss, from a
//! loader supplied with the call. Concurrent misses for one key run the
//! loader once and share its result; batch operations report an outcome per
//! key instead of failing as a whole.
//!
//! # Features
//!
//! - `redis` - Enable the Redis store
//! - **Single-flight loading** - At most one concurrent load per key
//! - **Fault policy** - Surface store outages, or route them to the loader
//! - **Per-key batch errors** - [`BatchError`] keeps every failed key
//! - **Named instances** - [`CacheRegistry`] builds caches lazily from TOML
//!
//! # Examples
//!
//! ## Load on miss
//!
//! ```
//! use flightcache_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let cache = Cache::new(MemoryStore::new(), CacheConfig::default())?;
//!
//! let name: String = cache
//!     .get(
//!         "user:42:name",
//!         CallOptions::new().loader(|key: String| async move {
//!             Ok::<_, std::io::Error>(format!("name for {key}"))
//!         }),
//!     )
//!     .await?;
//! assert_eq!(name, "name for user:42:name");
//! # Ok(())
//! # }
//! ```
//!
//! ## Batch reads
//!
//! ```
//! use flightcache_cache::*;
//!
//! # async fn example() -> CacheResult<()> {
//! let cache = Cache::new(MemoryStore::new(), CacheConfig::default())?;
//! cache.set("a", &1_u32, CallOptions::new()).await?;
//!
//! let mut values: Vec<u32> = Vec::new();
//! let err = cache
//!     .mget_slice(&["a", "b"], &mut values, CallOptions::new())
//!     .await
//!     .unwrap_err();
//!
//! assert_eq!(values, vec![1]);
//! assert!(err.lookup("b").unwrap().is_miss());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
mod load;
pub mod options;
pub mod registry;
pub mod single_flight;
pub mod store;
mod write;

pub use batch::BatchError;
pub use cache::Cache;
pub use config::{CacheConfig, SingleFlightMode, StoreConfig};
pub use error::{CacheError, CacheResult};
pub use options::{BoxError, CacheDefaults, CallOptions, LoadFn};
pub use registry::{CacheRegistry, DEFAULT_CACHE_NAME};
pub use single_flight::{LoadFuture, NoSingleFlight, ShardedSingleFlight, SingleFlight};
pub use store::{CacheStore, MemoryStore, NoStore};

#[cfg(feature = "redis")]
pub use store::RedisStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::BatchError;
    pub use crate::cache::Cache;
    pub use crate::config::{CacheConfig, SingleFlightMode, StoreConfig};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::options::CallOptions;
    pub use crate::registry::CacheRegistry;
    pub use crate::store::{CacheStore, MemoryStore, NoStore};

    #[cfg(feature = "redis")]
    pub use crate::store::RedisStore;
}
