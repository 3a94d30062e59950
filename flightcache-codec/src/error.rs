//! Error types for codec operations

use thiserror::Error;

/// Errors raised by the serialize/compress pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The serializer could not encode the value
    #[error("Serialization failed: {0}")]
    SerializeFailed(String),

    /// The serializer could not decode the payload
    #[error("Deserialization failed: {0}")]
    DeserializeFailed(String),

    /// Compression operation failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    /// Decompression operation failed
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// A present value encoded to zero bytes, which is reserved for absence
    #[error("Value encoded to an empty payload")]
    EmptyEncoding,

    /// A payload with no bytes was handed to the decoder
    #[error("Payload is empty")]
    EmptyPayload,

    /// Serializer name not recognized (or its feature is disabled)
    #[error("Unsupported serializer: {0}")]
    UnsupportedSerializer(String),

    /// Compactor name not recognized (or its feature is disabled)
    #[error("Unsupported compactor: {0}")]
    UnsupportedCompactor(String),
}

impl CodecError {
    /// True for failures on the write path (serialize, compress).
    pub fn is_encode(&self) -> bool {
        matches!(
            self,
            Self::SerializeFailed(_) | Self::CompressionFailed(_) | Self::EmptyEncoding
        )
    }

    /// True for failures on the read path (decompress, deserialize).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::DeserializeFailed(_) | Self::DecompressionFailed(_))
    }
}
