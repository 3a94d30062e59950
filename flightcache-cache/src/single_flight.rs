//! Request coalescing: at most one concurrent load per key.
//!
//! [`ShardedSingleFlight`] partitions keys over a power-of-two number of
//! shards, each an independently locked map from key to the in-flight load.
//! The first caller for a key registers a flight and spawns the load; every
//! caller, the first included, then waits on the flight's completion signal.
//!
//! Loads run on their own task, so a caller that stops waiting (its future is
//! dropped, or a `timeout` fires) never cancels a load other callers share.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{trace, warn};
use xxhash_rust::xxh3::xxh3_64;

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 1 << 8;

/// A pending load producing an encoded payload.
pub type LoadFuture = BoxFuture<'static, CacheResult<Bytes>>;

/// Deduplicates concurrent loads sharing a key.
#[async_trait]
pub trait SingleFlight: Send + Sync {
    /// Run `load` for `key`, or join a load for `key` already in flight.
    ///
    /// Every caller joined to the same flight receives the same result.
    async fn run(&self, key: &str, load: LoadFuture) -> CacheResult<Bytes>;
}

/// Pass-through implementation: every call runs its own load.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSingleFlight;

#[async_trait]
impl SingleFlight for NoSingleFlight {
    async fn run(&self, _key: &str, load: LoadFuture) -> CacheResult<Bytes> {
        load.await
    }
}

type Outcome = Option<CacheResult<Bytes>>;
type Shard = RwLock<HashMap<String, watch::Receiver<Outcome>>>;

/// Sharded single-flight engine.
#[derive(Clone)]
pub struct ShardedSingleFlight {
    shards: Arc<[Shard]>,
    mask: u64,
}

impl ShardedSingleFlight {
    /// Create an engine with `shard_count` shards.
    ///
    /// `shard_count` must be a non-zero power of two.
    pub fn new(shard_count: usize) -> CacheResult<Self> {
        if shard_count == 0 || !shard_count.is_power_of_two() {
            return Err(CacheError::config(format!(
                "single-flight shard count must be a power of two, got {}",
                shard_count
            )));
        }

        let shards: Vec<Shard> = (0..shard_count)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Ok(Self {
            shards: shards.into(),
            mask: (shard_count - 1) as u64,
        })
    }

    /// Number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of loads currently registered across all shards.
    pub fn in_flight(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    fn shard_index(&self, key: &str) -> usize {
        (xxh3_64(key.as_bytes()) & self.mask) as usize
    }

    /// Find the flight for `key`, or register one and spawn `load` for it.
    fn join_or_start(&self, key: &str, load: LoadFuture) -> watch::Receiver<Outcome> {
        let index = self.shard_index(key);
        let shard = &self.shards[index];

        if let Some(flight) = shard.read().get(key) {
            trace!(key = %key, "Joining in-flight load");
            return flight.clone();
        }

        let mut waits = shard.write();
        // a racing caller may have registered between the two locks
        if let Some(flight) = waits.get(key) {
            trace!(key = %key, "Joining in-flight load");
            return flight.clone();
        }

        let (tx, rx) = watch::channel(None);
        waits.insert(key.to_string(), rx.clone());
        drop(waits);

        let guard = FlightGuard {
            shards: Arc::clone(&self.shards),
            index,
            key: key.to_string(),
        };
        tokio::spawn(async move {
            let result = load.await;
            tx.send_replace(Some(result));
            drop(guard);
        });

        rx
    }
}

impl Default for ShardedSingleFlight {
    fn default() -> Self {
        let shards: Vec<Shard> = (0..DEFAULT_SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards: shards.into(),
            mask: (DEFAULT_SHARD_COUNT - 1) as u64,
        }
    }
}

#[async_trait]
impl SingleFlight for ShardedSingleFlight {
    async fn run(&self, key: &str, load: LoadFuture) -> CacheResult<Bytes> {
        let mut rx = self.join_or_start(key, load);
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map(|published| published.clone());

        match outcome {
            Ok(outcome) => outcome
                .unwrap_or_else(|| Err(CacheError::loader("load finished without a result"))),
            Err(_) => {
                warn!(key = %key, "In-flight load ended without publishing a result");
                Err(CacheError::loader("load abandoned before completion"))
            }
        }
    }
}

/// Unregisters a flight when its load task ends, however it ends.
struct FlightGuard {
    shards: Arc<[Shard]>,
    index: usize,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.shards[self.index].write().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_load(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        payload: &'static [u8],
    ) -> LoadFuture {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(Bytes::from_static(payload))
        }
        .boxed()
    }

    #[test]
    fn test_shard_count_must_be_power_of_two() {
        assert!(ShardedSingleFlight::new(0).is_err());
        assert!(ShardedSingleFlight::new(3).is_err());
        assert!(ShardedSingleFlight::new(100).is_err());
        assert_eq!(ShardedSingleFlight::new(1).unwrap().shard_count(), 1);
        assert_eq!(ShardedSingleFlight::new(64).unwrap().shard_count(), 64);
        assert_eq!(
            ShardedSingleFlight::default().shard_count(),
            DEFAULT_SHARD_COUNT
        );
    }

    #[test]
    fn test_shard_index_is_stable_and_in_range() {
        let flight = ShardedSingleFlight::new(16).unwrap();
        for i in 0..1000 {
            let key = format!("user:{}", i);
            let index = flight.shard_index(&key);
            assert!(index < 16);
            assert_eq!(index, flight.shard_index(&key));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_share_one_load() {
        let flight = ShardedSingleFlight::new(8).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let flight = flight.clone();
                let load = counting_load(calls.clone(), Duration::from_millis(100), b"v");
                tokio::spawn(async move { flight.run("k", load).await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Bytes::from_static(b"v"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_do_not_coalesce() {
        let flight = ShardedSingleFlight::new(1).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = flight.run(
            "a",
            counting_load(calls.clone(), Duration::from_millis(20), b"a"),
        );
        let b = flight.run(
            "b",
            counting_load(calls.clone(), Duration::from_millis(20), b"b"),
        );
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(b.unwrap(), Bytes::from_static(b"b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_shared() {
        let flight = ShardedSingleFlight::default();
        let first = flight.run(
            "k",
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(CacheError::loader("db down"))
            }
            .boxed(),
        );
        let second = flight.run("k", async { Ok(Bytes::from_static(b"unused")) }.boxed());

        let (first, second) = tokio::join!(first, second);
        assert!(first.unwrap_err().is_loader());
        assert!(second.unwrap_err().is_loader());
    }

    #[tokio::test]
    async fn test_sequential_calls_load_again() {
        let flight = ShardedSingleFlight::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            flight
                .run("k", counting_load(calls.clone(), Duration::ZERO, b"v"))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_waiter_does_not_abort_load() {
        let flight = ShardedSingleFlight::default();
        let calls = Arc::new(AtomicUsize::new(0));

        // the caller that started the load gives up early
        let leader = tokio::time::timeout(
            Duration::from_millis(20),
            flight.run(
                "k",
                counting_load(calls.clone(), Duration::from_millis(200), b"v"),
            ),
        );
        let follower = {
            let flight = flight.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                flight
                    .run("k", counting_load(calls, Duration::ZERO, b"other"))
                    .await
            })
        };

        assert!(leader.await.is_err());
        assert_eq!(follower.await.unwrap().unwrap(), Bytes::from_static(b"v"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_load_unregisters_and_reports() {
        let flight = ShardedSingleFlight::default();
        let result = flight
            .run("k", async { panic!("load exploded") }.boxed())
            .await;

        assert!(result.unwrap_err().is_loader());
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_no_single_flight_runs_every_load() {
        let flight = NoSingleFlight;
        let calls = Arc::new(AtomicUsize::new(0));

        let a = flight.run(
            "k",
            counting_load(calls.clone(), Duration::from_millis(10), b"v"),
        );
        let b = flight.run(
            "k",
            counting_load(calls.clone(), Duration::from_millis(10), b"v"),
        );
        let _ = tokio::join!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
