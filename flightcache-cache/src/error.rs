//! Error types for cache operations.

use crate::batch::BatchError;
use flightcache_codec::CodecError;
use std::any::Any;
use std::fmt::Display;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
///
/// Every variant is a distinct identity so callers can tell "not found and
/// nothing to load it with" apart from "backend is broken" and "loader
/// failed" without looking at messages. The type is `Clone` because one
/// single-flight result is handed to every caller that joined the load.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Key absent from the store and no loader was supplied
    #[error("cache miss")]
    Miss,

    /// The store or loader produced a logically empty payload
    #[error("cache value is empty")]
    EmptyValue,

    /// Backend malfunction, as opposed to a legitimate miss
    #[error("cache store fault: {0}")]
    StoreFault(String),

    /// Serialize or compress failed
    #[error("encode failed: {0}")]
    Encode(String),

    /// Decompress or deserialize failed
    #[error("decode failed: {0}")]
    Decode(String),

    /// The caller-supplied loader returned an error or panicked
    #[error("loader failed: {0}")]
    Loader(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation on a cache (or registry) that has been closed
    #[error("cache is closed")]
    Closed,

    /// Per-key outcome of a batch operation
    #[error(transparent)]
    Batch(BatchError),
}

impl CacheError {
    /// Create a store fault.
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::StoreFault(msg.into())
    }

    /// Create a loader failure from any displayable error.
    pub fn loader<E: Display>(err: E) -> Self {
        Self::Loader(err.to_string())
    }

    /// Create a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Convert a panic payload caught around a loader into an error.
    pub(crate) fn loader_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::Loader(format!("loader panicked: {}", message))
    }

    /// Check if this error is a cache miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Check if this error is an empty value.
    pub fn is_empty_value(&self) -> bool {
        matches!(self, Self::EmptyValue)
    }

    /// Check if this error is a backend fault.
    pub fn is_store_fault(&self) -> bool {
        matches!(self, Self::StoreFault(_))
    }

    /// Check if this error came from the loader.
    pub fn is_loader(&self) -> bool {
        matches!(self, Self::Loader(_))
    }

    /// Get the batch detail if this is a composite error.
    pub fn batch(&self) -> Option<&BatchError> {
        match self {
            Self::Batch(batch) => Some(batch),
            _ => None,
        }
    }

    /// Look up the error recorded for `key` in a composite error.
    ///
    /// Returns `None` when the key succeeded, was not part of the batch, or
    /// when this error is not a composite.
    pub fn lookup(&self, key: &str) -> Option<&CacheError> {
        self.batch().and_then(|batch| batch.lookup(key))
    }

    /// Severity rank used to choose a batch's representative error.
    ///
    /// Lower ranks are chosen first: a miss, then an empty value, then
    /// anything else.
    pub(crate) fn severity(&self) -> u8 {
        match self {
            Self::Miss => 0,
            Self::EmptyValue => 1,
            _ => 2,
        }
    }
}

impl From<CodecError> for CacheError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::EmptyPayload => Self::EmptyValue,
            CodecError::UnsupportedSerializer(_) | CodecError::UnsupportedCompactor(_) => {
                Self::Config(err.to_string())
            }
            err if err.is_encode() => Self::Encode(err.to_string()),
            err => Self::Decode(err.to_string()),
        }
    }
}

impl From<BatchError> for CacheError {
    fn from(err: BatchError) -> Self {
        Self::Batch(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_errors_map_to_identities() {
        let err: CacheError = CodecError::SerializeFailed("bad".into()).into();
        assert!(matches!(err, CacheError::Encode(_)));

        let err: CacheError = CodecError::CompressionFailed("bad".into()).into();
        assert!(matches!(err, CacheError::Encode(_)));

        let err: CacheError = CodecError::EmptyEncoding.into();
        assert!(matches!(err, CacheError::Encode(_)));

        let err: CacheError = CodecError::DecompressionFailed("bad".into()).into();
        assert!(matches!(err, CacheError::Decode(_)));

        let err: CacheError = CodecError::DeserializeFailed("bad".into()).into();
        assert!(matches!(err, CacheError::Decode(_)));

        let err: CacheError = CodecError::EmptyPayload.into();
        assert!(err.is_empty_value());

        let err: CacheError = CodecError::UnsupportedSerializer("sonic".into()).into();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_predicates() {
        assert!(CacheError::Miss.is_miss());
        assert!(CacheError::store("connection refused").is_store_fault());
        assert!(CacheError::loader("db down").is_loader());
        assert!(!CacheError::Closed.is_miss());
    }

    #[test]
    fn test_loader_panic_message() {
        let err = CacheError::loader_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "loader failed: loader panicked: boom");

        let err = CacheError::loader_panic(Box::new(String::from("owned boom")));
        assert!(err.to_string().contains("owned boom"));

        let err = CacheError::loader_panic(Box::new(42_u32));
        assert!(err.to_string().contains("unknown panic payload"));
    }

    #[test]
    fn test_lookup_on_non_batch_is_none() {
        assert!(CacheError::Miss.lookup("k").is_none());
    }

    #[test]
    fn test_severity_order() {
        assert!(CacheError::Miss.severity() < CacheError::EmptyValue.severity());
        assert!(CacheError::EmptyValue.severity() < CacheError::store("x").severity());
    }
}
