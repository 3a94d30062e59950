//! Cache store trait definition and built-in backends.
//!
//! A store only moves opaque, already-encoded payloads. It reports three
//! outcomes for a read: `Ok(Some(bytes))` for a hit, `Ok(None)` for a miss,
//! and `Err(CacheError::StoreFault(..))` when the backend itself is broken.

mod memory;
mod noop;

#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
pub use noop::NoStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use crate::error::CacheResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use std::time::Duration;

/// Convert a TTL in seconds into the store's TTL; `<= 0` never expires.
pub fn ttl_from_secs(expire_secs: i64) -> Option<Duration> {
    if expire_secs > 0 {
        Some(Duration::from_secs(expire_secs as u64))
    } else {
        None
    }
}

/// Cache store trait for different cache backends.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read one payload.
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    /// Write one payload; `ttl = None` means the entry never expires.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete one key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Read several payloads.
    ///
    /// Returns one outcome per key, in the same order as `keys`. Backends
    /// with a native multi-get should override this; the default issues the
    /// reads concurrently.
    async fn get_many(&self, keys: &[&str]) -> Vec<CacheResult<Option<Bytes>>> {
        join_all(keys.iter().map(|key| self.get(key))).await
    }

    /// Write several payloads with one TTL.
    ///
    /// Returns one result per item, in the same order as `items`.
    async fn set_many(
        &self,
        items: &[(&str, Bytes)],
        ttl: Option<Duration>,
    ) -> Vec<CacheResult<()>> {
        join_all(
            items
                .iter()
                .map(|(key, value)| self.set(key, value.clone(), ttl)),
        )
        .await
    }

    /// Delete several keys.
    ///
    /// Returns one result per key, in the same order as `keys`.
    async fn delete_many(&self, keys: &[&str]) -> Vec<CacheResult<()>> {
        join_all(keys.iter().map(|key| self.delete(key))).await
    }

    /// Release backend resources.
    async fn close(&self) -> CacheResult<()> {
        Ok(())
    }
}
