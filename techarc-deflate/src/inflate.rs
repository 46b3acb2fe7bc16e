//! LZ77 + Huffman decoder.

use crate::tables::{
    DISTANCE_ALPHABET_SIZE, DISTANCE_SYMBOL_BITS, END_OF_BLOCK, LITLEN_ALPHABET_SIZE,
    LITLEN_SYMBOL_BITS, distance_base, length_base,
};
use techarc_core::{BitReader, Result, TechArcError};
use techarc_huffman::HuffmanTree;

/// Map running out of bits onto a corruption error at the current position.
fn truncated(err: TechArcError, reader: &BitReader<'_>) -> TechArcError {
    match err {
        TechArcError::OutOfData { .. } => {
            TechArcError::corrupted(reader.position(), "stream ended before end-of-block")
        }
        other => other,
    }
}

/// Decompress a payload produced by [`Deflater::compress`](crate::Deflater::compress).
pub fn inflate(payload: &[u8]) -> Result<Vec<u8>> {
    let (&padding, bits) = payload
        .split_first()
        .ok_or_else(|| TechArcError::corrupted(0, "DEFLATE payload is empty"))?;
    let mut reader = BitReader::new(bits, padding)?;

    let litlen = HuffmanTree::deserialize(&mut reader, LITLEN_SYMBOL_BITS, LITLEN_ALPHABET_SIZE)?;
    if litlen.is_empty() {
        return Err(TechArcError::corrupted(
            reader.position(),
            "missing literal/length tree",
        ));
    }
    let distance =
        HuffmanTree::deserialize(&mut reader, DISTANCE_SYMBOL_BITS, DISTANCE_ALPHABET_SIZE)?;

    let mut output = Vec::with_capacity(bits.len() * 3);

    loop {
        let symbol = litlen
            .decode_symbol(&mut reader)
            .map_err(|e| truncated(e, &reader))?;

        if symbol < END_OF_BLOCK {
            output.push(symbol as u8);
            continue;
        }
        if symbol == END_OF_BLOCK {
            break;
        }

        let (base, extra_bits) = length_base(symbol).ok_or_else(|| {
            TechArcError::corrupted(reader.position(), format!("invalid length symbol {symbol}"))
        })?;
        let extra = reader
            .read_bits(extra_bits)
            .map_err(|e| truncated(e, &reader))?;
        let length = usize::from(base) + extra as usize;

        if distance.is_empty() {
            return Err(TechArcError::corrupted(
                reader.position(),
                "match without a distance tree",
            ));
        }
        let dist_symbol = distance
            .decode_symbol(&mut reader)
            .map_err(|e| truncated(e, &reader))?;
        let (base, extra_bits) = distance_base(dist_symbol).ok_or_else(|| {
            TechArcError::corrupted(
                reader.position(),
                format!("invalid distance symbol {dist_symbol}"),
            )
        })?;
        let extra = reader
            .read_bits(extra_bits)
            .map_err(|e| truncated(e, &reader))?;
        let dist = usize::from(base) + extra as usize;

        if dist > output.len() {
            return Err(TechArcError::corrupted(
                reader.position(),
                format!(
                    "distance {dist} exceeds {} bytes of output",
                    output.len()
                ),
            ));
        }

        let start = output.len() - dist;
        if dist >= length {
            output.extend_from_within(start..start + length);
        } else {
            for i in 0..length {
                output.push(output[start + i]);
            }
        }
    }

    if !reader.is_exhausted() {
        return Err(TechArcError::corrupted(
            reader.position(),
            format!("{} bits after end-of-block", reader.bits_remaining()),
        ));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use techarc_core::BitWriter;

    #[test]
    fn test_empty_payload() {
        assert!(matches!(
            inflate(&[]),
            Err(TechArcError::CorruptData { .. })
        ));
    }

    #[test]
    fn test_distance_beyond_output() {
        // litlen tree {0: 'a' ... } built by hand: symbols 'a' and 257 and EOB.
        let mut litlen = vec![0u64; LITLEN_ALPHABET_SIZE];
        litlen[b'a' as usize] = 1;
        litlen[257] = 1;
        litlen[256] = 1;
        let litlen = HuffmanTree::build(&litlen);
        let litlen_codes = litlen.code_table(LITLEN_ALPHABET_SIZE).unwrap();
        let mut dist = vec![0u64; DISTANCE_ALPHABET_SIZE];
        dist[3] = 1; // distance 4
        let dist = HuffmanTree::build(&dist);
        let dist_codes = dist.code_table(DISTANCE_ALPHABET_SIZE).unwrap();

        let mut writer = BitWriter::new();
        litlen.serialize(&mut writer, LITLEN_SYMBOL_BITS).unwrap();
        dist.serialize(&mut writer, DISTANCE_SYMBOL_BITS).unwrap();
        let (bits, len) = litlen_codes[b'a' as usize].unwrap();
        writer.write_bits(bits, len).unwrap();
        let (bits, len) = litlen_codes[257].unwrap();
        writer.write_bits(bits, len).unwrap();
        let (bits, len) = dist_codes[3].unwrap();
        writer.write_bits(bits, len).unwrap();
        let (bits, len) = litlen_codes[256].unwrap();
        writer.write_bits(bits, len).unwrap();
        let (bytes, padding) = writer.finish();

        let mut payload = vec![padding];
        payload.extend_from_slice(&bytes);
        let err = inflate(&payload).unwrap_err();
        assert!(matches!(err, TechArcError::CorruptData { .. }));
        assert!(err.to_string().contains("distance 4"));
    }
}
