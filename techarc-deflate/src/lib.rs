//! # TechArc-Deflate
//!
//! LZ77 match finding over a 32 KiB window followed by Huffman coding of
//! the resulting literal/length and distance symbols. Length and distance
//! symbols use the RFC 1951 base/extra-bit tables, but the container is a
//! single block carrying its own serialized trees rather than a standard
//! DEFLATE bitstream.
//!
//! ## Payload Layout
//!
//! ```text
//! padding u8 | litlen tree | distance tree | tokens ... | end-of-block
//! ```
//!
//! The distance tree is empty (a single 0 bit) when the input produced no
//! matches.
//!
//! ## Example
//!
//! ```rust
//! use techarc_deflate::{compress, decompress};
//!
//! let original = b"Hello, World! Hello, World! Hello, World!";
//! let compressed = compress(original).unwrap();
//! assert!(compressed.len() < original.len());
//! assert_eq!(decompress(&compressed).unwrap(), original);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod inflate;
pub mod lz77;
pub mod tables;

pub use deflate::Deflater;
pub use inflate::inflate;
pub use lz77::{Lz77Config, Lz77Encoder, Lz77Token};

use techarc_core::{Codec, CompressionMethod, FormatTag, Result};

/// Compress with the default match finder settings.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Deflater::default().compress(data)
}

/// Compress with explicit match finder settings.
pub fn compress_with_config(data: &[u8], config: Lz77Config) -> Result<Vec<u8>> {
    Deflater::new(config).compress(data)
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>> {
    inflate(payload)
}

/// [`Codec`] adapter for the `TCD1` blob format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCodec {
    /// Match finder settings used when compressing.
    pub config: Lz77Config,
}

impl Codec for DeflateCodec {
    const TAG: FormatTag = FormatTag::Deflate;
    const METHOD: CompressionMethod = CompressionMethod::Deflate;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        compress_with_config(data, self.config)
    }

    fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>> {
        decompress(payload)
    }
}
