//! Per-call options and their resolution against instance defaults.
//!
//! A [`CallOptions`] value is built fresh for every call and consumed by it,
//! so nothing set on one call can be observed by another. Resolution never
//! mutates the instance defaults it reads from.

use crate::store::ttl_from_secs;
use flightcache_codec::{Codec, Compactor, Serializer};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Boxed error returned by loaders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type-erased loader.
///
/// `Ok(None)` means the value is known to be absent; it is cached as an
/// empty payload and reported as [`CacheError::EmptyValue`].
///
/// [`CacheError::EmptyValue`]: crate::CacheError::EmptyValue
pub type LoadFn<T> =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Option<T>, BoxError>> + Send + Sync>;

/// Overrides for a single cache call.
///
/// # Examples
///
/// ```
/// use flightcache_cache::CallOptions;
/// use flightcache_codec::Compactor;
///
/// let opts = CallOptions::<String>::new()
///     .compactor(Compactor::Raw)
///     .expire_secs(30)
///     .loader(|key: String| async move { Ok::<_, std::io::Error>(format!("loaded {key}")) });
/// ```
pub struct CallOptions<T> {
    serializer: Option<Serializer>,
    compactor: Option<Compactor>,
    expire_secs: i64,
    loader: Option<LoadFn<T>>,
    force_load: bool,
    skip_write_back: bool,
}

impl<T> CallOptions<T> {
    /// Options with nothing overridden.
    pub fn new() -> Self {
        Self {
            serializer: None,
            compactor: None,
            expire_secs: 0,
            loader: None,
            force_load: false,
            skip_write_back: false,
        }
    }

    /// Override the serializer.
    pub fn serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Override the compactor.
    pub fn compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = Some(compactor);
        self
    }

    /// Override the TTL in seconds.
    ///
    /// 0 keeps the instance default; a negative value never expires.
    pub fn expire_secs(mut self, secs: i64) -> Self {
        self.expire_secs = secs;
        self
    }

    /// Load misses with `f`.
    pub fn loader<F, Fut, E>(self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
        T: Send + 'static,
    {
        self.optional_loader(move |key: String| f(key).map(|res| res.map(Some)))
    }

    /// Load misses with `f`, which may report the value as absent.
    ///
    /// An absent value is written back as an empty payload, so later reads
    /// fail fast with `EmptyValue` until it expires.
    pub fn optional_loader<F, Fut, E>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
        T: Send + 'static,
    {
        self.loader = Some(Arc::new(move |key: String| {
            f(key)
                .map(|res| res.map_err(Into::<BoxError>::into))
                .boxed()
        }));
        self
    }

    /// Use an already type-erased loader.
    pub fn load_fn(mut self, loader: LoadFn<T>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Skip the store read and always load.
    pub fn force_load(mut self) -> Self {
        self.force_load = true;
        self
    }

    /// Do not persist loaded values.
    pub fn skip_write_back(mut self) -> Self {
        self.skip_write_back = true;
        self
    }

    /// Whether a loader is set.
    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }
}

impl<T> Default for CallOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CallOptions<T> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer,
            compactor: self.compactor,
            expire_secs: self.expire_secs,
            loader: self.loader.clone(),
            force_load: self.force_load,
            skip_write_back: self.skip_write_back,
        }
    }
}

impl<T> fmt::Debug for CallOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("serializer", &self.serializer)
            .field("compactor", &self.compactor)
            .field("expire_secs", &self.expire_secs)
            .field("loader", &self.loader.is_some())
            .field("force_load", &self.force_load)
            .field("skip_write_back", &self.skip_write_back)
            .finish()
    }
}

/// Instance-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDefaults {
    pub codec: Codec,
    pub expire_secs: i64,
}

impl CacheDefaults {
    /// Fill every field `opts` leaves unset from these defaults.
    ///
    /// Each field falls back independently.
    pub fn resolve<T>(&self, opts: CallOptions<T>) -> ResolvedOptions<T> {
        let expire_secs = if opts.expire_secs == 0 {
            self.expire_secs
        } else {
            opts.expire_secs
        };

        ResolvedOptions {
            codec: Codec::new(
                opts.serializer.unwrap_or(self.codec.serializer),
                opts.compactor.unwrap_or(self.codec.compactor),
            ),
            ttl: ttl_from_secs(expire_secs),
            loader: opts.loader,
            force_load: opts.force_load,
            skip_write_back: opts.skip_write_back,
        }
    }
}

/// Options for one call after defaults are applied.
pub struct ResolvedOptions<T> {
    pub codec: Codec,
    pub ttl: Option<Duration>,
    pub loader: Option<LoadFn<T>>,
    pub force_load: bool,
    pub skip_write_back: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> CacheDefaults {
        CacheDefaults {
            codec: Codec::new(Serializer::Json, Compactor::Gzip),
            expire_secs: 300,
        }
    }

    #[test]
    fn test_unset_fields_take_defaults() {
        let resolved = defaults().resolve(CallOptions::<u32>::new());
        assert_eq!(resolved.codec, Codec::new(Serializer::Json, Compactor::Gzip));
        assert_eq!(resolved.ttl, Some(Duration::from_secs(300)));
        assert!(resolved.loader.is_none());
        assert!(!resolved.force_load);
        assert!(!resolved.skip_write_back);
    }

    #[test]
    fn test_fields_default_independently() {
        let resolved = defaults().resolve(CallOptions::<u32>::new().serializer(Serializer::Yaml));
        assert_eq!(resolved.codec.serializer, Serializer::Yaml);
        assert_eq!(resolved.codec.compactor, Compactor::Gzip);

        let resolved = defaults().resolve(CallOptions::<u32>::new().compactor(Compactor::Raw));
        assert_eq!(resolved.codec.serializer, Serializer::Json);
        assert_eq!(resolved.codec.compactor, Compactor::Raw);
    }

    #[test]
    fn test_later_override_wins() {
        let opts = CallOptions::<u32>::new()
            .expire_secs(10)
            .compactor(Compactor::Zstd)
            .expire_secs(20)
            .compactor(Compactor::Raw);
        let resolved = defaults().resolve(opts);
        assert_eq!(resolved.ttl, Some(Duration::from_secs(20)));
        assert_eq!(resolved.codec.compactor, Compactor::Raw);
    }

    #[test]
    fn test_expire_override() {
        let resolved = defaults().resolve(CallOptions::<u32>::new().expire_secs(0));
        assert_eq!(resolved.ttl, Some(Duration::from_secs(300)));

        let resolved = defaults().resolve(CallOptions::<u32>::new().expire_secs(-1));
        assert_eq!(resolved.ttl, None);

        let never = CacheDefaults {
            expire_secs: 0,
            ..defaults()
        };
        assert_eq!(never.resolve(CallOptions::<u32>::new()).ttl, None);
    }

    #[test]
    fn test_resolution_does_not_leak_between_calls() {
        let defaults = defaults();
        let first = defaults.resolve(
            CallOptions::<u32>::new()
                .serializer(Serializer::Yaml)
                .expire_secs(5)
                .force_load()
                .skip_write_back()
                .loader(|_| async { Ok::<_, std::io::Error>(1) }),
        );
        assert!(first.force_load);

        let second = defaults.resolve(CallOptions::<u32>::new());
        assert_eq!(second.codec, defaults.codec);
        assert_eq!(second.ttl, Some(Duration::from_secs(300)));
        assert!(second.loader.is_none());
        assert!(!second.force_load);
        assert!(!second.skip_write_back);
    }

    #[tokio::test]
    async fn test_loader_wraps_value() {
        let opts = CallOptions::<String>::new()
            .loader(|key: String| async move { Ok::<_, std::io::Error>(key.to_uppercase()) });
        assert!(opts.has_loader());

        let loader = defaults().resolve(opts).loader.unwrap();
        let value = loader("abc".to_string()).await.unwrap();
        assert_eq!(value, Some("ABC".to_string()));
    }

    #[tokio::test]
    async fn test_optional_loader_can_report_absent() {
        let opts = CallOptions::<String>::new()
            .optional_loader(|_| async { Ok::<Option<String>, std::io::Error>(None) });

        let loader = defaults().resolve(opts).loader.unwrap();
        assert_eq!(loader("k".to_string()).await.unwrap(), None);
    }
}
