//! Redis cache store.

use crate::error::{CacheError, CacheResult};
use crate::store::CacheStore;
use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tracing::{debug, warn};

/// Redis-backed store.
///
/// `nil` replies are misses. A transport or command error is a fault for
/// every key the command covered.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    key_prefix: Option<String>,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flightcache_cache::store::RedisStore;
    ///
    /// # async fn example() -> flightcache_cache::CacheResult<()> {
    /// let store = RedisStore::connect("redis://localhost:6379", Some("app".into())).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str, key_prefix: Option<String>) -> CacheResult<Self> {
        let client = Client::open(url).map_err(|e| CacheError::config(e.to_string()))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(fault)?;

        debug!(url = %url, "Connected Redis cache store");
        Ok(Self {
            connection,
            key_prefix,
        })
    }

    /// Get the underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn build_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn fault(err: redis::RedisError) -> CacheError {
    CacheError::store(err.to_string())
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        let value: Option<Vec<u8>> = conn.get(&key).await.map_err(fault)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();

        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(&key, value.as_ref(), ttl.as_secs().max(1))
                    .await
                    .map_err(fault)?;
            }
            None => {
                let _: () = conn.set(&key, value.as_ref()).await.map_err(fault)?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let key = self.build_key(key);
        let mut conn = self.connection.clone();
        let _: () = conn.del(&key).await.map_err(fault)?;
        Ok(())
    }

    async fn get_many(&self, keys: &[&str]) -> Vec<CacheResult<Option<Bytes>>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let full_keys: Vec<String> = keys.iter().map(|key| self.build_key(key)).collect();
        let mut conn = self.connection.clone();

        let reply: redis::RedisResult<Vec<Option<Vec<u8>>>> = redis::cmd("MGET")
            .arg(&full_keys)
            .query_async(&mut conn)
            .await;

        match reply {
            Ok(values) if values.len() == keys.len() => values
                .into_iter()
                .map(|value| Ok(value.map(Bytes::from)))
                .collect(),
            Ok(values) => {
                warn!(
                    expected = keys.len(),
                    received = values.len(),
                    "Redis MGET reply length mismatch"
                );
                let err = CacheError::store("redis MGET reply length mismatch");
                keys.iter().map(|_| Err(err.clone())).collect()
            }
            Err(e) => {
                let err = fault(e);
                keys.iter().map(|_| Err(err.clone())).collect()
            }
        }
    }

    async fn set_many(
        &self,
        items: &[(&str, Bytes)],
        ttl: Option<Duration>,
    ) -> Vec<CacheResult<()>> {
        if items.is_empty() {
            return Vec::new();
        }

        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();

        match ttl {
            // a single MSET when nothing expires
            None => {
                let pairs: Vec<(String, &[u8])> = items
                    .iter()
                    .map(|(key, value)| (self.build_key(key), value.as_ref()))
                    .collect();
                pipe.cmd("MSET").arg(&pairs).ignore();
            }
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                for (key, value) in items {
                    pipe.cmd("SET")
                        .arg(self.build_key(key))
                        .arg(value.as_ref())
                        .arg("EX")
                        .arg(seconds)
                        .ignore();
                }
            }
        }

        let outcome: CacheResult<()> = pipe.query_async(&mut conn).await.map_err(fault);
        items.iter().map(|_| outcome.clone()).collect()
    }

    async fn delete_many(&self, keys: &[&str]) -> Vec<CacheResult<()>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let full_keys: Vec<String> = keys.iter().map(|key| self.build_key(key)).collect();
        let mut conn = self.connection.clone();

        let outcome: CacheResult<()> = conn.del(&full_keys).await.map_err(fault);
        keys.iter().map(|_| outcome.clone()).collect()
    }
}
