//! LZ77 + Huffman encoder.

use crate::lz77::{Lz77Config, Lz77Token, tokenize};
use crate::tables::{
    DISTANCE_ALPHABET_SIZE, DISTANCE_SYMBOL_BITS, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
    LITLEN_SYMBOL_BITS, distance_to_code, length_to_code,
};
use techarc_core::{BitWriter, Result, TechArcError};
use techarc_huffman::{Code, HuffmanTree};

/// Encoder producing `padding u8 | litlen tree | distance tree | tokens | EOB`.
#[derive(Debug, Clone, Default)]
pub struct Deflater {
    config: Lz77Config,
}

impl Deflater {
    /// Create an encoder with the given match finder settings.
    pub fn new(config: Lz77Config) -> Self {
        Self { config }
    }

    /// Compress `data` into a payload.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let tokens = tokenize(data, self.config);

        let mut litlen_freqs = vec![0u64; LITLEN_ALPHABET_SIZE];
        let mut distance_freqs = vec![0u64; DISTANCE_ALPHABET_SIZE];
        for token in &tokens {
            match *token {
                Lz77Token::Literal(byte) => litlen_freqs[byte as usize] += 1,
                Lz77Token::Match { length, distance } => {
                    litlen_freqs[length_to_code(length).0 as usize] += 1;
                    distance_freqs[distance_to_code(distance).0 as usize] += 1;
                }
            }
        }
        litlen_freqs[END_OF_BLOCK as usize] += 1;

        let litlen_tree = HuffmanTree::build(&litlen_freqs);
        let distance_tree = HuffmanTree::build(&distance_freqs);
        let litlen_codes = litlen_tree.code_table(LITLEN_ALPHABET_SIZE)?;
        let distance_codes = distance_tree.code_table(DISTANCE_ALPHABET_SIZE)?;

        let mut writer = BitWriter::with_capacity(data.len() / 2 + 128);
        litlen_tree.serialize(&mut writer, LITLEN_SYMBOL_BITS)?;
        distance_tree.serialize(&mut writer, DISTANCE_SYMBOL_BITS)?;

        for token in &tokens {
            match *token {
                Lz77Token::Literal(byte) => {
                    write_code(&mut writer, &litlen_codes, u16::from(byte))?;
                }
                Lz77Token::Match { length, distance } => {
                    let (symbol, extra_bits, extra) = length_to_code(length);
                    write_code(&mut writer, &litlen_codes, symbol)?;
                    writer.write_bits(u64::from(extra), extra_bits)?;

                    let (symbol, extra_bits, extra) = distance_to_code(distance);
                    write_code(&mut writer, &distance_codes, symbol)?;
                    writer.write_bits(u64::from(extra), extra_bits)?;
                }
            }
        }
        write_code(&mut writer, &litlen_codes, END_OF_BLOCK)?;

        let (bytes, padding) = writer.finish();
        let mut payload = Vec::with_capacity(bytes.len() + 1);
        payload.push(padding);
        payload.extend_from_slice(&bytes);
        Ok(payload)
    }
}

#[inline]
fn write_code(writer: &mut BitWriter, codes: &[Option<Code>], symbol: u16) -> Result<()> {
    let (bits, len) = codes
        .get(symbol as usize)
        .copied()
        .flatten()
        .ok_or_else(|| TechArcError::invalid_argument(format!("symbol {symbol} has no code")))?;
    writer.write_bits(bits, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_layout() {
        let payload = Deflater::default().compress(b"").unwrap();
        // litlen tree: 1 + 1 + 9 bits, distance tree: 1 bit, EOB: 1 bit
        assert_eq!(payload.len(), 1 + 13usize.div_ceil(8));
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let data = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(20);
        let payload = Deflater::default().compress(&data).unwrap();
        assert!(payload.len() < data.len() / 10);
    }
}
