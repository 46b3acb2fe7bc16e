//! LZW dictionary (code table) management.

use crate::config::{LITERAL_CODES, LzwConfig};
use std::collections::HashMap;

/// LZW dictionary for encoding and decoding.
///
/// Entries are keyed by `(prefix code, next byte)` for encoding; the decoder
/// keeps the expanded byte string of every code. Both sides reset whenever
/// the entry count reaches `max_entries`, so reset points depend only on the
/// number of learned entries.
#[derive(Debug, Clone)]
pub struct LzwDictionary {
    /// Code table for decoding: code -> byte sequence.
    table: Vec<Vec<u8>>,
    /// Reverse lookup for encoding: (prefix, byte) -> code.
    reverse: HashMap<(u16, u8), u16>,
    /// Number of live codes.
    len: usize,
    /// Configuration.
    config: LzwConfig,
    /// How many times the table has been cleared.
    resets: u64,
    /// Whether `table` is maintained (decoder side).
    keep_strings: bool,
}

impl LzwDictionary {
    fn with_mode(config: LzwConfig, keep_strings: bool) -> Self {
        let mut dict = Self {
            table: Vec::new(),
            reverse: HashMap::new(),
            len: LITERAL_CODES,
            config,
            resets: 0,
            keep_strings,
        };
        dict.clear();
        dict
    }

    /// Dictionary for the encoding side.
    pub fn for_encoding(config: LzwConfig) -> Self {
        Self::with_mode(config, false)
    }

    /// Dictionary for the decoding side.
    pub fn for_decoding(config: LzwConfig) -> Self {
        Self::with_mode(config, true)
    }

    fn clear(&mut self) {
        self.reverse.clear();
        self.table.clear();
        if self.keep_strings {
            self.table.reserve(self.config.max_entries);
            self.table.extend((0..LITERAL_CODES).map(|b| vec![b as u8]));
        }
        self.len = LITERAL_CODES;
    }

    /// Reset to the 256 literal codes and count the reset.
    pub fn reset(&mut self) {
        self.clear();
        self.resets += 1;
    }

    /// Number of live codes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// A dictionary always holds at least the literal codes.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True once the entry count has reached the cap.
    pub fn is_full(&self) -> bool {
        self.len >= self.config.max_entries
    }

    /// Number of resets performed so far.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Look up the code for `prefix` extended by `byte`.
    #[inline]
    pub fn find(&self, prefix: u16, byte: u8) -> Option<u16> {
        self.reverse.get(&(prefix, byte)).copied()
    }

    /// Learn `prefix + byte` (encoder side).
    pub fn add_pair(&mut self, prefix: u16, byte: u8) -> u16 {
        let code = self.len as u16;
        self.reverse.insert((prefix, byte), code);
        self.len += 1;
        code
    }

    /// Learn a full string (decoder side).
    pub fn add_string(&mut self, string: Vec<u8>) -> u16 {
        let code = self.len as u16;
        self.table.push(string);
        self.len += 1;
        code
    }

    /// Get the byte sequence for a code.
    pub fn get_string(&self, code: u16) -> Option<&[u8]> {
        self.table.get(code as usize).map(Vec::as_slice)
    }

    /// Get the configuration.
    pub fn config(&self) -> &LzwConfig {
        &self.config
    }
}
