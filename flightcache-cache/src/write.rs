//! Write paths: `set` and `mset`.

use crate::batch::BatchError;
use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::options::CallOptions;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

impl Cache {
    /// Encode `value` and store it under `key`.
    ///
    /// Only the codec and TTL overrides of `opts` apply. An encode failure
    /// is returned before the store is touched.
    pub async fn set<T>(&self, key: &str, value: &T, opts: CallOptions<T>) -> CacheResult<()>
    where
        T: Serialize,
    {
        self.ensure_open()?;
        let opts = self.defaults.resolve(opts);

        let payload = opts.codec.encode(value)?;
        trace!(cache = %self.name, key = %key, bytes = payload.len(), "Cache set");
        self.store.set(key, Bytes::from(payload), opts.ttl).await
    }

    /// Encode and store every entry of `items` with one TTL.
    ///
    /// Entries that fail to encode are reported without being sent to the
    /// store; the rest go to the store in one batch write. The returned
    /// error carries the outcome of each failed key.
    pub async fn mset<T>(&self, items: &HashMap<String, T>, opts: CallOptions<T>) -> CacheResult<()>
    where
        T: Serialize,
    {
        self.ensure_open()?;
        if items.is_empty() {
            return Ok(());
        }
        let opts = self.defaults.resolve(opts);

        let mut outcomes: Vec<(String, CacheResult<()>)> = Vec::new();
        let mut encoded: Vec<(&str, Bytes)> = Vec::with_capacity(items.len());
        for (key, value) in items {
            match opts.codec.encode(value) {
                Ok(payload) => encoded.push((key.as_str(), Bytes::from(payload))),
                Err(err) => outcomes.push((key.clone(), Err(CacheError::from(err)))),
            }
        }

        if !encoded.is_empty() {
            let results = self.store.set_many(&encoded, opts.ttl).await;
            if results.len() == encoded.len() {
                outcomes.extend(
                    encoded
                        .iter()
                        .map(|(key, _)| key.to_string())
                        .zip(results),
                );
            } else {
                let fault = CacheError::store(format!(
                    "store returned {} results for {} keys",
                    results.len(),
                    encoded.len()
                ));
                outcomes.extend(
                    encoded
                        .iter()
                        .map(|(key, _)| (key.to_string(), Err(fault.clone()))),
                );
            }
        }

        debug!(
            cache = %self.name,
            keys = items.len(),
            encoded = encoded.len(),
            "Cache mset"
        );
        BatchError::collect(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::store::{CacheStore, MemoryStore};
    use serde::ser::{Error as _, Serializer};

    /// A value whose serialization always fails.
    enum Payload {
        Good(u32),
        Bad,
    }

    impl Serialize for Payload {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Payload::Good(n) => serializer.serialize_u32(*n),
                Payload::Bad => Err(S::Error::custom("refusing to serialize")),
            }
        }
    }

    #[tokio::test]
    async fn test_set_encode_failure_touches_nothing() {
        let store = MemoryStore::new();
        let cache = Cache::new(store.clone(), CacheConfig::default()).unwrap();

        let err = cache
            .set("k", &Payload::Bad, CallOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Encode(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_uses_ttl_override() {
        let store = MemoryStore::new();
        let cache = Cache::new(store.clone(), CacheConfig::default()).unwrap();

        cache
            .set("forever", &1_u32, CallOptions::new().expire_secs(-1))
            .await
            .unwrap();
        cache
            .set("default", &1_u32, CallOptions::new())
            .await
            .unwrap();

        assert_eq!(store.ttl("forever").await, None);
        assert!(store.ttl("default").await.is_some());
    }

    #[tokio::test]
    async fn test_mset_reports_encode_failures_per_key() {
        let store = MemoryStore::new();
        let cache = Cache::new(store.clone(), CacheConfig::default()).unwrap();

        let mut items = HashMap::new();
        items.insert("good".to_string(), Payload::Good(7));
        items.insert("bad".to_string(), Payload::Bad);

        let err = cache.mset(&items, CallOptions::new()).await.unwrap_err();
        assert!(err.lookup("good").is_none());
        assert!(matches!(err.lookup("bad"), Some(CacheError::Encode(_))));

        assert!(store.get("good").await.unwrap().is_some());
        assert!(store.get("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mset_reports_store_failures_per_key() {
        let store = MemoryStore::with_max_entries(1);
        let cache = Cache::new(store, CacheConfig::default()).unwrap();

        let mut items = HashMap::new();
        items.insert("a".to_string(), 1_u32);
        items.insert("b".to_string(), 2_u32);

        let err = cache.mset(&items, CallOptions::new()).await.unwrap_err();
        let batch = err.batch().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch.primary().is_store_fault());
    }

    #[tokio::test]
    async fn test_mset_empty_is_ok() {
        let cache = Cache::new(MemoryStore::new(), CacheConfig::default()).unwrap();
        let items: HashMap<String, u32> = HashMap::new();
        assert!(cache.mset(&items, CallOptions::new()).await.is_ok());
    }
}
