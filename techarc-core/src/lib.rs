//! # TechArc Core
//!
//! Core components shared by the TechArc codecs and archive container.
//!
//! - [`bitstream`]: MSB-first bit I/O with explicit padding counts
//! - [`crc`]: CRC-32 checksums
//! - [`format`]: magic tags for every stream and container
//! - [`traits`]: the [`Codec`] trait implemented by each algorithm crate
//! - [`entry`]: archive entry metadata
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Archive                                                 │
//! │     TCAF container, volumes, recovery, encryption      │
//! ├─────────────────────────────────────────────────────────┤
//! │ Dispatch                                                │
//! │     entropy heuristic, algorithm selection, tags       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Codec                                                   │
//! │     LZW, Huffman, LZ77+Huffman                         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Core (this crate)                                       │
//! │     BitReader/BitWriter, CRC, tags, errors             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use techarc_core::bitstream::{BitReader, BitWriter};
//! use techarc_core::crc::Crc32;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0xABC, 12).unwrap();
//! let (bytes, padding) = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes, padding).unwrap();
//! assert_eq!(reader.read_bits(12).unwrap(), 0xABC);
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod crc;
pub mod entry;
pub mod error;
pub mod format;
pub mod traits;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use crc::Crc32;
pub use entry::{CompressionMethod, Entry};
pub use error::{Result, TechArcError};
pub use format::FormatTag;
pub use traits::{Codec, StoredCodec};
