//! In-process cache store.

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Clone)]
struct Entry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// In-memory store with per-entry expiry.
///
/// Expired entries read as misses and are dropped on the next write that
/// needs the room. An optional entry cap turns writes of new keys into store
/// faults once the map is full of live entries; there is no eviction.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    max_entries: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_entries: None,
        }
    }

    /// Create a store holding at most `max_entries` live keys.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_entries: Some(max_entries),
        }
    }

    /// Number of stored entries, live or not yet purged.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// True if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Drop every expired entry; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut data = self.data.write().await;
        purge(&mut data)
    }

    /// Remaining time to live of `key`, if it is live and has an expiry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let data = self.data.read().await;
        let now = Instant::now();
        data.get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|exp| exp - now)
    }

    fn insert(
        &self,
        data: &mut HashMap<String, Entry>,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        if let Some(max) = self.max_entries {
            if !data.contains_key(key) && data.len() >= max && purge(data) == 0 {
                return Err(CacheError::store(format!(
                    "memory store is full ({} entries)",
                    max
                )));
            }
        }

        let expires_at = ttl.map(|d| Instant::now() + d);
        data.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn purge(data: &mut HashMap<String, Entry>) -> usize {
    let before = data.len();
    let now = Instant::now();
    data.retain(|_, entry| entry.is_live(now));
    let removed = before - data.len();
    if removed > 0 {
        debug!(removed = removed, "Purged expired memory store entries");
    }
    removed
}

fn read(data: &HashMap<String, Entry>, key: &str, now: Instant) -> Option<Bytes> {
    data.get(key)
        .filter(|entry| entry.is_live(now))
        .map(|entry| entry.value.clone())
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let data = self.data.read().await;
        let value = read(&data, key, Instant::now());
        trace!(key = %key, hit = value.is_some(), "Memory store get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        let mut data = self.data.write().await;
        self.insert(&mut data, key, value, ttl)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Vec<CacheResult<Option<Bytes>>> {
        let data = self.data.read().await;
        let now = Instant::now();
        keys.iter().map(|key| Ok(read(&data, key, now))).collect()
    }

    async fn set_many(
        &self,
        items: &[(&str, Bytes)],
        ttl: Option<Duration>,
    ) -> Vec<CacheResult<()>> {
        let mut data = self.data.write().await;
        items
            .iter()
            .map(|(key, value)| self.insert(&mut data, key, value.clone(), ttl))
            .collect()
    }

    async fn delete_many(&self, keys: &[&str]) -> Vec<CacheResult<()>> {
        let mut data = self.data.write().await;
        keys.iter()
            .map(|key| {
                data.remove(*key);
                Ok(())
            })
            .collect()
    }

    async fn close(&self) -> CacheResult<()> {
        self.data.write().await.clear();
        Ok(())
    }
}
