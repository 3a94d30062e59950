//! Byte compression stage of the codec pipeline

use crate::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Compression algorithm applied to serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compactor {
    /// No compression (pass-through)
    #[default]
    Raw,

    /// Gzip compression
    #[cfg(feature = "gzip")]
    Gzip,

    /// Brotli compression (best ratio for text)
    #[cfg(feature = "brotli")]
    Brotli,

    /// Zstd compression (fast with good ratio)
    #[cfg(feature = "zstd")]
    Zstd,
}

impl Compactor {
    /// Stable name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            #[cfg(feature = "gzip")]
            Self::Gzip => "gzip",
            #[cfg(feature = "brotli")]
            Self::Brotli => "brotli",
            #[cfg(feature = "zstd")]
            Self::Zstd => "zstd",
        }
    }

    /// Level used when compressing cache payloads.
    pub fn default_level(&self) -> u32 {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip => 6,
            #[cfg(feature = "brotli")]
            Self::Brotli => 4,
            #[cfg(feature = "zstd")]
            Self::Zstd => 3,
            _ => 0,
        }
    }

    /// Compress `data`.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Raw => Ok(data.to_vec()),
            #[cfg(feature = "gzip")]
            Self::Gzip => compress_gzip(data, self.default_level()),
            #[cfg(feature = "brotli")]
            Self::Brotli => compress_brotli(data, self.default_level()),
            #[cfg(feature = "zstd")]
            Self::Zstd => compress_zstd(data, self.default_level()),
        }
    }

    /// Reverse [`Compactor::compress`].
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Raw => Ok(data.to_vec()),
            #[cfg(feature = "gzip")]
            Self::Gzip => decompress_gzip(data),
            #[cfg(feature = "brotli")]
            Self::Brotli => decompress_brotli(data),
            #[cfg(feature = "zstd")]
            Self::Zstd => decompress_zstd(data),
        }
    }
}

impl fmt::Display for Compactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compactor {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" | "none" => Ok(Self::Raw),
            #[cfg(feature = "gzip")]
            "gzip" => Ok(Self::Gzip),
            #[cfg(feature = "brotli")]
            "brotli" | "br" => Ok(Self::Brotli),
            #[cfg(feature = "zstd")]
            "zstd" => Ok(Self::Zstd),
            other => Err(CodecError::UnsupportedCompactor(other.to_string())),
        }
    }
}

// ========== Gzip Implementation ==========

#[cfg(feature = "gzip")]
fn compress_gzip(data: &[u8], level: u32) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))
}

#[cfg(feature = "gzip")]
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    let mut decoder = GzDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
    Ok(output)
}

// ========== Brotli Implementation ==========

#[cfg(feature = "brotli")]
fn compress_brotli(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let params = brotli::enc::BrotliEncoderParams {
        quality: level as i32,
        ..Default::default()
    };

    let mut reader = std::io::Cursor::new(data);
    brotli::BrotliCompress(&mut reader, &mut output, &params)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))?;

    Ok(output)
}

#[cfg(feature = "brotli")]
fn decompress_brotli(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    brotli::BrotliDecompress(&mut std::io::Cursor::new(data), &mut output)
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))?;
    Ok(output)
}

// ========== Zstd Implementation ==========

#[cfg(feature = "zstd")]
fn compress_zstd(data: &[u8], level: u32) -> Result<Vec<u8>> {
    zstd::encode_all(std::io::Cursor::new(data), level as i32)
        .map_err(|e| CodecError::CompressionFailed(e.to_string()))
}

#[cfg(feature = "zstd")]
fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(std::io::Cursor::new(data))
        .map_err(|e| CodecError::DecompressionFailed(e.to_string()))
}
