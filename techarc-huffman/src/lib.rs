//! # TechArc-Huffman
//!
//! Static Huffman coding over bytes, plus the tree builder and serializer
//! shared with the LZ77 codec.
//!
//! ## Payload Format
//!
//! ```text
//! padding u8 | symbol_count u64 | [tree-present bit] [preorder tree] [codes...] [zero padding]
//! ```
//!
//! Leaves carry 8-bit symbols. The decoder must consume exactly
//! `symbol_count` symbols and every meaningful bit, so a truncated or
//! extended payload is rejected.
//!
//! ## Example
//!
//! ```rust
//! use techarc_huffman::{compress, decompress};
//!
//! let data = b"abracadabra abracadabra";
//! let payload = compress(data).unwrap();
//! assert_eq!(decompress(&payload).unwrap(), data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

mod tree;

pub use tree::{Code, HuffmanTree, MAX_CODE_LENGTH};

use techarc_core::{
    BitReader, BitWriter, Codec, CompressionMethod, FormatTag, Result, TechArcError,
};

/// Symbol width of byte leaves.
pub const BYTE_SYMBOL_BITS: u8 = 8;

/// Padding byte plus symbol count.
const HEADER_LEN: usize = 9;

/// Compress `data` into a Huffman payload.
///
/// Fails only if the tree would need codes longer than [`MAX_CODE_LENGTH`].
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let tree = HuffmanTree::from_bytes(data);
    let table = tree.code_table(256)?;

    let mut writer = BitWriter::with_capacity(data.len() / 2 + 64);
    tree.serialize(&mut writer, BYTE_SYMBOL_BITS)?;
    for &byte in data {
        if let Some((bits, len)) = table[byte as usize] {
            writer.write_bits(bits, len)?;
        }
    }

    let (bytes, padding) = writer.finish();
    let mut payload = Vec::with_capacity(bytes.len() + HEADER_LEN);
    payload.push(padding);
    payload.extend_from_slice(&(data.len() as u64).to_be_bytes());
    payload.extend_from_slice(&bytes);
    Ok(payload)
}

/// Decompress a payload produced by [`compress`].
pub fn decompress(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < HEADER_LEN {
        return Err(TechArcError::corrupted(0, "Huffman payload header truncated"));
    }
    let padding = payload[0];
    let mut count = [0u8; 8];
    count.copy_from_slice(&payload[1..HEADER_LEN]);
    let count = u64::from_be_bytes(count);
    let bits = &payload[HEADER_LEN..];
    let mut reader = BitReader::new(bits, padding)?;

    let tree = HuffmanTree::deserialize(&mut reader, BYTE_SYMBOL_BITS, 256)?;
    if tree.is_empty() && count > 0 {
        return Err(TechArcError::corrupted(
            HEADER_LEN as u64,
            "symbols declared without a Huffman tree",
        ));
    }
    // Every symbol costs at least one bit.
    if count > reader.bits_remaining() {
        return Err(TechArcError::corrupted(
            HEADER_LEN as u64,
            format!(
                "{count} symbols declared but only {} bits remain",
                reader.bits_remaining()
            ),
        ));
    }

    let mut output = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match tree.decode_symbol(&mut reader) {
            Ok(symbol) => output.push(symbol as u8),
            Err(TechArcError::OutOfData { .. }) => {
                return Err(TechArcError::corrupted(
                    reader.position(),
                    "Huffman code stream truncated",
                ));
            }
            Err(err) => return Err(err),
        }
    }

    if !reader.is_exhausted() {
        return Err(TechArcError::corrupted(
            reader.position(),
            format!("{} unexpected trailing bits", reader.bits_remaining()),
        ));
    }

    Ok(output)
}

/// [`Codec`] adapter for the `TCH1` blob format.
#[derive(Debug, Clone, Copy, Default)]
pub struct HuffmanCodec;

impl Codec for HuffmanCodec {
    const TAG: FormatTag = FormatTag::Huffman;
    const METHOD: CompressionMethod = CompressionMethod::Huffman;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        compress(data)
    }

    fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>> {
        decompress(payload)
    }
}
