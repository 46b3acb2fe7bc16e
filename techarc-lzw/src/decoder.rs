//! LZW decoder (decompression).

use crate::config::LzwConfig;
use crate::dictionary::LzwDictionary;
use techarc_core::{Result, TechArcError};

/// LZW decoder.
///
/// Mirrors [`LzwEncoder`](crate::LzwEncoder): the dictionary survives between
/// [`LzwDecoder::decode`] calls, and each call starts a new pending string.
#[derive(Debug, Clone)]
pub struct LzwDecoder {
    dict: LzwDictionary,
}

impl LzwDecoder {
    /// Create a decoder with the standard 4096-entry dictionary.
    pub fn new() -> Self {
        Self {
            dict: LzwDictionary::for_decoding(LzwConfig::STANDARD),
        }
    }

    /// Create a decoder with a custom configuration.
    pub fn with_config(config: LzwConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            dict: LzwDictionary::for_decoding(config),
        })
    }

    /// Decode a stream of big-endian 16-bit code words.
    pub fn decode(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if input.len() % 2 != 0 {
            return Err(TechArcError::corrupted(
                input.len() as u64,
                "LZW code stream has odd length",
            ));
        }

        let mut output = Vec::with_capacity(input.len() * 2);
        let mut previous: Option<Vec<u8>> = None;

        for (index, pair) in input.chunks_exact(2).enumerate() {
            let code = u16::from_be_bytes([pair[0], pair[1]]);
            let offset = (index * 2) as u64;

            // The encoder learned one entry per emitted code and reset when
            // the table filled; replay that before resolving this code.
            if previous.is_some() && self.dict.len() + 1 >= self.dict.config().max_entries {
                self.dict.reset();
                previous = None;
            }

            let entry = match (self.dict.get_string(code), previous.as_ref()) {
                (Some(known), _) => known.to_vec(),
                (None, Some(prev)) if usize::from(code) == self.dict.len() => {
                    let mut entry = prev.clone();
                    entry.push(prev[0]);
                    entry
                }
                _ => {
                    return Err(TechArcError::corrupted(
                        offset,
                        format!(
                            "undefined LZW code {code} (dictionary holds {})",
                            self.dict.len()
                        ),
                    ));
                }
            };

            output.extend_from_slice(&entry);

            if let Some(mut prev) = previous.take() {
                prev.push(entry[0]);
                self.dict.add_string(prev);
            }
            previous = Some(entry);
        }

        Ok(output)
    }

    /// Discard everything learned so far.
    pub fn reset(&mut self) {
        let config = *self.dict.config();
        self.dict = LzwDictionary::for_decoding(config);
    }

    /// Number of dictionary resets replayed so far.
    pub fn resets(&self) -> u64 {
        self.dict.resets()
    }
}

impl Default for LzwDecoder {
    fn default() -> Self {
        Self::new()
    }
}
