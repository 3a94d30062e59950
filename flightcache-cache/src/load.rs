//! Load-on-miss read paths: `get`, `mget`, `mget_slice`, `single_flight_do`.

use crate::batch::BatchError;
use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};
use crate::options::{BoxError, CallOptions, LoadFn, ResolvedOptions};
use crate::single_flight::LoadFuture;
use crate::store::CacheStore;
use bytes::Bytes;
use flightcache_codec::Codec;
use futures::FutureExt;
use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

impl Cache {
    /// Get the value of `key`, loading it on a miss.
    ///
    /// Without a loader a miss is [`CacheError::Miss`]. A store fault is
    /// returned as is unless the cache ignores faults, in which case it is
    /// logged and the loader runs instead. Concurrent loads of one key are
    /// coalesced.
    pub async fn get<T>(&self, key: &str, opts: CallOptions<T>) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_open()?;
        let opts = self.defaults.resolve(opts);

        let outcome = if opts.force_load {
            None
        } else {
            Some(self.store.get(key).await)
        };

        let payload = self.fetch(key, outcome, &opts).await?;
        decode(&opts.codec, &payload)
    }

    /// Get every key of `dest`, storing decoded values in place.
    ///
    /// The store is read once for all keys; misses are then loaded one key
    /// at a time, each coalesced with concurrent loads of the same key.
    /// Entries of failed keys are left untouched and the returned error
    /// carries the outcome of each failed key.
    pub async fn mget<T>(
        &self,
        dest: &mut HashMap<String, T>,
        opts: CallOptions<T>,
    ) -> CacheResult<()>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_open()?;
        let keys: Vec<String> = dest.keys().cloned().collect();
        let results = self.fetch_many(&keys, opts).await;

        let mut outcomes = Vec::with_capacity(keys.len());
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(value) => {
                    dest.insert(key.clone(), value);
                    outcomes.push((key, Ok(())));
                }
                Err(err) => outcomes.push((key, Err(err))),
            }
        }

        BatchError::collect(outcomes)
    }

    /// Get `keys`, appending the values that decode to `dest` in key order.
    ///
    /// Failed keys are left out of `dest` and reported in the returned
    /// error.
    pub async fn mget_slice<T>(
        &self,
        keys: &[&str],
        dest: &mut Vec<T>,
        opts: CallOptions<T>,
    ) -> CacheResult<()>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_open()?;
        let keys: Vec<String> = keys.iter().map(|key| key.to_string()).collect();
        let results = self.fetch_many(&keys, opts).await;

        let mut outcomes = Vec::with_capacity(keys.len());
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(value) => {
                    dest.push(value);
                    outcomes.push((key, Ok(())));
                }
                Err(err) => outcomes.push((key, Err(err))),
            }
        }

        BatchError::collect(outcomes)
    }

    /// Always run the loader for `key`, bypassing the store read.
    ///
    /// Concurrent calls for the same key still share one load. Fails with a
    /// loader error when `opts` has no loader.
    pub async fn single_flight_do<T>(&self, key: &str, opts: CallOptions<T>) -> CacheResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.ensure_open()?;
        let opts = self.defaults.resolve(opts.force_load());
        let Some(loader) = &opts.loader else {
            return Err(CacheError::loader("no loader supplied"));
        };

        let load = self.load_future(key, Arc::clone(loader), &opts);
        let payload = self.single_flight.run(key, load).await?;
        decode(&opts.codec, &payload)
    }

    /// Read-through for several keys; one result per key, in order.
    async fn fetch_many<T>(&self, keys: &[String], opts: CallOptions<T>) -> Vec<CacheResult<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        if keys.is_empty() {
            return Vec::new();
        }

        let opts = self.defaults.resolve(opts);
        let outcomes: Vec<Option<CacheResult<Option<Bytes>>>> = if opts.force_load {
            keys.iter().map(|_| None).collect()
        } else {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let mut read = self.store.get_many(&refs).await;
            // a store returning the wrong number of outcomes is broken
            if read.len() != keys.len() {
                let fault = CacheError::store(format!(
                    "store returned {} results for {} keys",
                    read.len(),
                    keys.len()
                ));
                read = keys.iter().map(|_| Err(fault.clone())).collect();
            }
            read.into_iter().map(Some).collect()
        };

        let opts = &opts;
        join_all(keys.iter().zip(outcomes).map(|(key, outcome)| async move {
            let payload = self.fetch(key, outcome, opts).await?;
            decode(&opts.codec, &payload)
        }))
        .await
    }

    /// Turn one store outcome into a payload, loading on a miss.
    ///
    /// `outcome` is `None` when the store read was skipped.
    async fn fetch<T>(
        &self,
        key: &str,
        outcome: Option<CacheResult<Option<Bytes>>>,
        opts: &ResolvedOptions<T>,
    ) -> CacheResult<Bytes>
    where
        T: Serialize + Send + 'static,
    {
        let cache_err = match outcome {
            Some(Ok(Some(payload))) => {
                trace!(cache = %self.name, key = %key, "Cache hit");
                return Ok(payload);
            }
            None | Some(Ok(None)) => {
                trace!(cache = %self.name, key = %key, "Cache miss");
                CacheError::Miss
            }
            Some(Err(err)) if err.is_miss() => CacheError::Miss,
            Some(Err(err)) => {
                if !self.ignore_cache_fault {
                    return Err(err);
                }
                error!(
                    cache = %self.name,
                    key = %key,
                    error = %err,
                    "Cache store fault, falling back to loader"
                );
                err
            }
        };

        let Some(loader) = &opts.loader else {
            return Err(cache_err);
        };

        let load = self.load_future(key, Arc::clone(loader), opts);
        self.single_flight.run(key, load).await
    }

    /// Build the shared load for `key`: call the loader, encode the value,
    /// then write it back unless asked not to.
    ///
    /// Panics anywhere in that sequence become loader errors.
    fn load_future<T>(
        &self,
        key: &str,
        loader: LoadFn<T>,
        opts: &ResolvedOptions<T>,
    ) -> LoadFuture
    where
        T: Serialize + Send + 'static,
    {
        let load = LoadTask {
            cache: self.name.clone(),
            key: key.to_string(),
            store: Arc::clone(&self.store),
            codec: opts.codec,
            ttl: opts.ttl,
            write_back: !opts.skip_write_back,
            ignore_cache_fault: self.ignore_cache_fault,
        };

        AssertUnwindSafe(load.run(loader))
            .catch_unwind()
            .map(|result| result.unwrap_or_else(|panic| Err(CacheError::loader_panic(panic))))
            .boxed()
    }
}

/// Everything a load needs, owned so it can outlive the caller.
struct LoadTask {
    cache: String,
    key: String,
    store: Arc<dyn CacheStore>,
    codec: Codec,
    ttl: Option<Duration>,
    write_back: bool,
    ignore_cache_fault: bool,
}

impl LoadTask {
    async fn run<T>(self, loader: LoadFn<T>) -> CacheResult<Bytes>
    where
        T: Serialize + Send + 'static,
    {
        debug!(cache = %self.cache, key = %self.key, "Loading value");
        let value = loader(self.key.clone()).await.map_err(loader_error)?;

        let payload = match value {
            Some(value) => Bytes::from(self.codec.encode(&value)?),
            None => Bytes::new(),
        };

        if self.write_back {
            if let Err(err) = self.store.set(&self.key, payload.clone(), self.ttl).await {
                if !self.ignore_cache_fault {
                    return Err(err);
                }
                error!(
                    cache = %self.cache,
                    key = %self.key,
                    error = %err,
                    "Failed to write loaded value back to the cache"
                );
            }
        }

        Ok(payload)
    }
}

/// Keep the identity of cache errors raised inside a loader.
fn loader_error(err: BoxError) -> CacheError {
    match err.downcast::<CacheError>() {
        Ok(err) => *err,
        Err(err) => CacheError::loader(err),
    }
}

fn decode<T: DeserializeOwned>(codec: &Codec, payload: &[u8]) -> CacheResult<T> {
    codec.decode(payload).map_err(CacheError::from)
}
