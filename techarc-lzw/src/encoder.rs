//! LZW encoder (compression).

use crate::config::LzwConfig;
use crate::dictionary::LzwDictionary;
use techarc_core::Result;

/// LZW encoder.
///
/// The encoder owns its dictionary, so a single value can compress several
/// chunks in sequence (solid mode) with the dictionary carried across calls.
/// Construct a fresh encoder, or call [`LzwEncoder::reset`], to start over.
#[derive(Debug, Clone)]
pub struct LzwEncoder {
    dict: LzwDictionary,
}

impl LzwEncoder {
    /// Create an encoder with the standard 4096-entry dictionary.
    pub fn new() -> Self {
        Self {
            dict: LzwDictionary::for_encoding(LzwConfig::STANDARD),
        }
    }

    /// Create an encoder with a custom configuration.
    pub fn with_config(config: LzwConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dict: LzwDictionary::for_encoding(config),
        })
    }

    /// Encode `input` into big-endian 16-bit code words.
    ///
    /// The pending string is flushed at the end of every call; the learned
    /// dictionary is kept for the next call.
    pub fn encode(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len());
        let mut current: Option<u16> = None;

        for &byte in input {
            let Some(prefix) = current else {
                current = Some(u16::from(byte));
                continue;
            };

            if let Some(code) = self.dict.find(prefix, byte) {
                current = Some(code);
                continue;
            }

            output.extend_from_slice(&prefix.to_be_bytes());
            self.dict.add_pair(prefix, byte);
            if self.dict.is_full() {
                self.dict.reset();
            }
            current = Some(u16::from(byte));
        }

        if let Some(code) = current {
            output.extend_from_slice(&code.to_be_bytes());
        }

        output
    }

    /// Discard everything learned so far.
    pub fn reset(&mut self) {
        let config = *self.dict.config();
        self.dict = LzwDictionary::for_encoding(config);
    }

    /// Number of dictionary resets triggered by the cap.
    pub fn resets(&self) -> u64 {
        self.dict.resets()
    }

    /// Current dictionary size.
    pub fn dictionary_len(&self) -> usize {
        self.dict.len()
    }
}

impl Default for LzwEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[test]
    fn test_encode_classic_sequence() {
        let mut encoder = LzwEncoder::new();
        let out = encoder.encode(b"ABABABA");
        // A B AB ABA
        assert_eq!(codes(&out), vec![65, 66, 256, 258]);
    }

    #[test]
    fn test_encode_empty() {
        let mut encoder = LzwEncoder::new();
        assert!(encoder.encode(b"").is_empty());
        assert_eq!(encoder.dictionary_len(), 256);
    }

    #[test]
    fn test_dictionary_carried_across_calls() {
        let mut encoder = LzwEncoder::new();
        let first = encoder.encode(b"ABAB");
        let learned = encoder.dictionary_len();
        assert!(learned > 256);

        let second = encoder.encode(b"ABAB");
        assert!(second.len() <= first.len());

        encoder.reset();
        assert_eq!(encoder.dictionary_len(), 256);
    }

    #[test]
    fn test_cap_triggers_reset() {
        let mut encoder = LzwEncoder::with_config(LzwConfig::new(300).unwrap()).unwrap();
        let data: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 251) as u8).collect();
        encoder.encode(&data);
        assert!(encoder.resets() >= 1);
        assert!(encoder.dictionary_len() < 300);
    }
}
