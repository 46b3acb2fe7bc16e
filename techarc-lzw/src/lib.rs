//! # TechArc-LZW: Pure Rust LZW Compression
//!
//! Lempel-Ziv-Welch coding with fixed 16-bit big-endian code words and a
//! bounded dictionary.
//!
//! ## Stream Format
//!
//! - **Code words**: every code is written as two bytes, big-endian
//! - **Literal table**: codes 0-255 are the single bytes
//! - **Dictionary cap**: 4096 entries by default; when the cap is reached both
//!   encoder and decoder reset to the literal table
//! - **No terminator**: the stream ends with the last code word, so an empty
//!   input produces an empty stream
//!
//! ## Example
//!
//! ```rust
//! use techarc_lzw::{compress, decompress};
//!
//! let original = b"TOBEORNOTTOBEORTOBEORNOT";
//! let compressed = compress(original);
//! assert!(compressed.len() < 48);
//!
//! let decompressed = decompress(&compressed).unwrap();
//! assert_eq!(decompressed, original);
//! ```
//!
//! ## Solid Mode
//!
//! [`LzwEncoder`] and [`LzwDecoder`] keep their dictionaries between calls,
//! so a sequence of chunks can share one learned table:
//!
//! ```rust
//! use techarc_lzw::{LzwDecoder, LzwEncoder};
//!
//! let mut encoder = LzwEncoder::new();
//! let a = encoder.encode(b"shared prefix, first file");
//! let b = encoder.encode(b"shared prefix, second file");
//!
//! let mut decoder = LzwDecoder::new();
//! assert_eq!(decoder.decode(&a).unwrap(), b"shared prefix, first file");
//! assert_eq!(decoder.decode(&b).unwrap(), b"shared prefix, second file");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

mod config;
mod decoder;
mod dictionary;
mod encoder;

pub use config::{LITERAL_CODES, LzwConfig};
pub use decoder::LzwDecoder;
pub use dictionary::LzwDictionary;
pub use encoder::LzwEncoder;

use techarc_core::{Codec, CompressionMethod, FormatTag, Result};

/// Compress data with a fresh standard dictionary.
///
/// Never fails; empty input yields an empty code stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    LzwEncoder::new().encode(data)
}

/// Decompress a code stream produced by [`compress`].
///
/// Fails with `CorruptData` when the stream length is odd or a code refers
/// to an entry that does not exist yet.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    LzwDecoder::new().decode(data)
}

/// Compress with a custom dictionary configuration.
pub fn compress_with_config(data: &[u8], config: LzwConfig) -> Result<Vec<u8>> {
    Ok(LzwEncoder::with_config(config)?.encode(data))
}

/// Decompress with a custom dictionary configuration.
pub fn decompress_with_config(data: &[u8], config: LzwConfig) -> Result<Vec<u8>> {
    LzwDecoder::with_config(config)?.decode(data)
}

/// [`Codec`] adapter for the `TCZ1` blob format.
#[derive(Debug, Clone, Copy, Default)]
pub struct LzwCodec;

impl Codec for LzwCodec {
    const TAG: FormatTag = FormatTag::Lzw;
    const METHOD: CompressionMethod = CompressionMethod::Lzw;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(compress(data))
    }

    fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>> {
        decompress(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_classic() {
        let original = b"TOBEORNOTTOBEORTOBEORNOT";
        let compressed = compress(original);
        assert_eq!(compressed.len(), 32);
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_deterministic() {
        let data = b"This is a test of compression! ".repeat(10);
        assert_eq!(compress(&data), compress(&data));
    }

    #[test]
    fn test_codec_tagged() {
        let blob = LzwCodec.compress_tagged(b"hello hello hello").unwrap();
        assert_eq!(&blob[..4], b"TCZ1");
        assert_eq!(LzwCodec.decompress(&blob[4..]).unwrap(), b"hello hello hello");
    }

    #[test]
    fn test_small_config_roundtrip() {
        let config = LzwConfig::new(260).unwrap();
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabc".repeat(4);
        let compressed = compress_with_config(&data, config).unwrap();
        assert_eq!(decompress_with_config(&compressed, config).unwrap(), data);
    }
}
