//! MSB-first bit-level I/O over in-memory buffers.
//!
//! TechArc codecs pack variable-length codes most significant bit first.
//! The final byte of a stream is zero-padded; the number of padding bits is
//! returned by [`BitWriter::finish`] and must be handed back to
//! [`BitReader::new`], which then refuses to read past the last meaningful bit.
//!
//! # Example
//!
//! ```
//! use techarc_core::bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3).unwrap();
//! writer.write_bit(true);
//! let (bytes, padding) = writer.finish();
//! assert_eq!(bytes, vec![0b1011_0000]);
//! assert_eq!(padding, 4);
//!
//! let mut reader = BitReader::new(&bytes, padding).unwrap();
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert!(reader.read_bit().unwrap());
//! assert!(reader.read_bit().is_err());
//! ```

use crate::error::{Result, TechArcError};

#[inline]
fn low_mask(count: u8) -> u64 {
    if count >= 64 {
        u64::MAX
    } else {
        (1u64 << count) - 1
    }
}

/// MSB-first bit writer that accumulates into a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// Completed bytes.
    output: Vec<u8>,
    /// Pending bits, right-aligned.
    buffer: u64,
    /// Number of pending bits (always < 8 between calls).
    bits_in_buffer: u8,
    /// Total bits written.
    total_bits: u64,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `bytes` bytes of output.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            output: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    #[inline]
    fn push_bits(&mut self, value: u64, count: u8) {
        debug_assert!(count <= 32);
        self.buffer = (self.buffer << count) | (value & low_mask(count));
        self.bits_in_buffer += count;
        self.total_bits += u64::from(count);

        while self.bits_in_buffer >= 8 {
            let byte = (self.buffer >> (self.bits_in_buffer - 8)) as u8;
            self.output.push(byte);
            self.bits_in_buffer -= 8;
        }
        self.buffer &= low_mask(self.bits_in_buffer);
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.push_bits(u64::from(bit), 1);
    }

    /// Write the low `count` bits of `value`, most significant first.
    ///
    /// `count` may be 0 to 64.
    pub fn write_bits(&mut self, value: u64, count: u8) -> Result<()> {
        if count > 64 {
            return Err(TechArcError::invalid_argument(format!(
                "cannot write {count} bits at once"
            )));
        }
        if count > 32 {
            self.push_bits(value >> 32, count - 32);
            self.push_bits(value & 0xFFFF_FFFF, 32);
        } else if count > 0 {
            self.push_bits(value, count);
        }
        Ok(())
    }

    /// Total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.total_bits
    }

    /// Flush the final partial byte and return `(bytes, padding_count)`.
    pub fn finish(mut self) -> (Vec<u8>, u8) {
        if self.bits_in_buffer == 0 {
            return (self.output, 0);
        }
        let padding = 8 - self.bits_in_buffer;
        self.output.push((self.buffer << padding) as u8);
        (self.output, padding)
    }
}

/// MSB-first bit reader over a byte slice with a known padding count.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Next bit to read.
    position: u64,
    /// Number of meaningful bits.
    bit_len: u64,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `data` whose last byte carries `padding` unused bits.
    pub fn new(data: &'a [u8], padding: u8) -> Result<Self> {
        if padding > 7 {
            return Err(TechArcError::corrupted(
                0,
                format!("invalid padding count {padding}"),
            ));
        }
        if data.is_empty() && padding != 0 {
            return Err(TechArcError::corrupted(0, "padding declared on empty stream"));
        }
        Ok(Self {
            data,
            position: 0,
            bit_len: data.len() as u64 * 8 - u64::from(padding),
        })
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.position >= self.bit_len {
            return Err(TechArcError::out_of_data(1));
        }
        let byte = self.data[(self.position / 8) as usize];
        let bit = (byte >> (7 - (self.position % 8))) & 1;
        self.position += 1;
        Ok(bit == 1)
    }

    /// Read `count` bits (0 to 64), most significant first.
    pub fn read_bits(&mut self, count: u8) -> Result<u64> {
        if count > 64 {
            return Err(TechArcError::invalid_argument(format!(
                "cannot read {count} bits at once"
            )));
        }
        let remaining = self.bits_remaining();
        if u64::from(count) > remaining {
            return Err(TechArcError::out_of_data(
                (u64::from(count) - remaining) as u32,
            ));
        }

        let mut value = 0u64;
        let mut left = count;
        while left > 0 {
            let bit_offset = (self.position % 8) as u8;
            let available = 8 - bit_offset;
            let take = available.min(left);
            let byte = self.data[(self.position / 8) as usize];
            let chunk = (byte >> (available - take)) & (low_mask(take) as u8);
            value = (value << take) | u64::from(chunk);
            self.position += u64::from(take);
            left -= take;
        }
        Ok(value)
    }

    /// Number of meaningful bits not yet consumed.
    #[inline]
    pub fn bits_remaining(&self) -> u64 {
        self.bit_len - self.position
    }

    /// Number of bits consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True once every meaningful bit has been read.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.bit_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_msb_order() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 1).unwrap();
        writer.write_bits(0b0110011, 7).unwrap();
        writer.write_bits(0xF, 4).unwrap();
        let (bytes, padding) = writer.finish();
        assert_eq!(bytes, vec![0b1011_0011, 0b1111_0000]);
        assert_eq!(padding, 4);
    }

    #[test]
    fn test_empty_stream() {
        let (bytes, padding) = BitWriter::new().finish();
        assert!(bytes.is_empty());
        assert_eq!(padding, 0);

        let mut reader = BitReader::new(&bytes, padding).unwrap();
        assert!(matches!(
            reader.read_bit(),
            Err(TechArcError::OutOfData { .. })
        ));
    }

    #[test]
    fn test_wide_values() {
        let mut writer = BitWriter::new();
        writer.write_bits(u64::MAX, 64).unwrap();
        writer.write_bits(0x1_2345_6789, 33).unwrap();
        writer.write_bit(false);
        let (bytes, padding) = writer.finish();
        assert_eq!(bytes.len(), 13);
        assert_eq!(padding, 6);

        let mut reader = BitReader::new(&bytes, padding).unwrap();
        assert_eq!(reader.read_bits(64).unwrap(), u64::MAX);
        assert_eq!(reader.read_bits(33).unwrap(), 0x1_2345_6789);
        assert!(!reader.read_bit().unwrap());
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_padding_bits_are_not_readable() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b11, 2).unwrap();
        let (bytes, padding) = writer.finish();
        assert_eq!(padding, 6);

        let mut reader = BitReader::new(&bytes, padding).unwrap();
        assert_eq!(reader.bits_remaining(), 2);
        assert!(reader.read_bits(3).is_err());
        assert_eq!(reader.read_bits(2).unwrap(), 0b11);
    }

    #[test]
    fn test_invalid_padding() {
        assert!(BitReader::new(&[0xFF], 8).is_err());
        assert!(BitReader::new(&[], 1).is_err());
    }

    #[test]
    fn test_count_limits() {
        let mut writer = BitWriter::new();
        assert!(writer.write_bits(0, 65).is_err());
        writer.write_bits(0, 0).unwrap();
        assert_eq!(writer.bits_written(), 0);
    }
}
