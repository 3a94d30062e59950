//! Payload codec for flightcache.
//!
//! A cache record is never the raw value: it is the value serialized with a
//! [`Serializer`] and then compressed with a [`Compactor`]. [`Codec`] pairs the
//! two and fixes the stage order in both directions.
//!
//! # Features
//!
//! - `gzip` - Enable gzip compression (enabled by default)
//! - `zstd` - Enable zstd compression (enabled by default)
//! - `brotli` - Enable brotli compression
//! - `yaml` - Enable the YAML serializer (enabled by default)
//! - `bincode` - Enable the bincode serializer (enabled by default)
//! - `full` - Enable everything
//!
//! # Example
//!
//! ```rust
//! use flightcache_codec::{Codec, Compactor, Serializer};
//!
//! let codec = Codec::new(Serializer::Json, Compactor::Raw);
//! let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
//! let back: Vec<i32> = codec.decode(&bytes).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

mod codec;
mod compactor;
mod error;
mod serializer;

pub use codec::Codec;
pub use compactor::Compactor;
pub use error::CodecError;
pub use serializer::Serializer;

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
