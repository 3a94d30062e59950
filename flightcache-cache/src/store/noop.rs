//! A store that caches nothing.

use crate::error::CacheResult;
use crate::store::CacheStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Every read misses; writes and deletes succeed and are discarded.
///
/// Paired with a loader this turns every `get` into a coalesced load.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

#[async_trait]
impl CacheStore for NoStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<Bytes>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Option<Duration>) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Vec<CacheResult<Option<Bytes>>> {
        keys.iter().map(|_| Ok(None)).collect()
    }

    async fn set_many(
        &self,
        items: &[(&str, Bytes)],
        _ttl: Option<Duration>,
    ) -> Vec<CacheResult<()>> {
        items.iter().map(|_| Ok(())).collect()
    }
}
