// Flightcache - cache-aside loading for Rust
//
// This library returns values from a cache store or, on a miss, from a loader
// supplied with the call, running at most one concurrent load per key.

// Re-export member crates
pub use flightcache_cache as cache;
pub use flightcache_codec as codec;

// Re-export the cache surface
pub use flightcache_cache::{
    BatchError, BoxError, Cache, CacheConfig, CacheError, CacheRegistry, CacheResult, CacheStore,
    CallOptions, MemoryStore, NoStore, SingleFlightMode, StoreConfig,
};
pub use flightcache_codec::{Codec, CodecError, Compactor, Serializer};

#[cfg(feature = "redis")]
pub use flightcache_cache::RedisStore;

// Prelude for common imports
pub mod prelude {
    pub use flightcache_cache::prelude::*;
    pub use flightcache_codec::{Codec, Compactor, Serializer};
}
