//! The two-stage encode/decode pipeline

use crate::{CodecError, Compactor, Result, Serializer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A serializer paired with a compactor.
///
/// Encoding runs marshal then compress; decoding runs decompress then
/// unmarshal. The first failing stage determines the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Codec {
    /// Serialization stage
    pub serializer: Serializer,
    /// Compression stage
    pub compactor: Compactor,
}

impl Codec {
    /// Pair a serializer with a compactor.
    pub fn new(serializer: Serializer, compactor: Compactor) -> Self {
        Self {
            serializer,
            compactor,
        }
    }

    /// Marshal then compress `value`.
    ///
    /// An empty payload stands for an absent value, so a value whose encoding
    /// has no bytes (a unit struct under bincode without compression) fails
    /// with [`CodecError::EmptyEncoding`].
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let raw = self.serializer.marshal(value)?;
        let encoded = self.compactor.compress(&raw)?;
        if encoded.is_empty() {
            return Err(CodecError::EmptyEncoding);
        }
        Ok(encoded)
    }

    /// Decompress then unmarshal `data`.
    ///
    /// An empty payload is rejected with [`CodecError::EmptyPayload`] before
    /// either stage runs.
    pub fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        if data.is_empty() {
            return Err(CodecError::EmptyPayload);
        }
        let raw = self.compactor.decompress(data)?;
        self.serializer.unmarshal(&raw)
    }
}
