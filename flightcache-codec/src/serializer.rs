//! Value serialization stage of the codec pipeline

use crate::{CodecError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format used to turn values into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serializer {
    /// JSON via `serde_json`
    #[default]
    Json,

    /// YAML via `serde_yaml`
    #[cfg(feature = "yaml")]
    Yaml,

    /// Compact binary via `bincode`
    #[cfg(feature = "bincode")]
    Bincode,
}

impl Serializer {
    /// Stable name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            #[cfg(feature = "yaml")]
            Self::Yaml => "yaml",
            #[cfg(feature = "bincode")]
            Self::Bincode => "bincode",
        }
    }

    /// Serialize `value` into bytes.
    pub fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => {
                serde_json::to_vec(value).map_err(|e| CodecError::SerializeFailed(e.to_string()))
            }
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| CodecError::SerializeFailed(e.to_string())),
            #[cfg(feature = "bincode")]
            Self::Bincode => {
                bincode::serialize(value).map_err(|e| CodecError::SerializeFailed(e.to_string()))
            }
        }
    }

    /// Deserialize a value of type `T` from `data`.
    pub fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        match self {
            Self::Json => serde_json::from_slice(data)
                .map_err(|e| CodecError::DeserializeFailed(e.to_string())),
            #[cfg(feature = "yaml")]
            Self::Yaml => serde_yaml::from_slice(data)
                .map_err(|e| CodecError::DeserializeFailed(e.to_string())),
            #[cfg(feature = "bincode")]
            Self::Bincode => bincode::deserialize(data)
                .map_err(|e| CodecError::DeserializeFailed(e.to_string())),
        }
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Serializer {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            #[cfg(feature = "yaml")]
            "yaml" | "yml" => Ok(Self::Yaml),
            #[cfg(feature = "bincode")]
            "bincode" => Ok(Self::Bincode),
            other => Err(CodecError::UnsupportedSerializer(other.to_string())),
        }
    }
}
