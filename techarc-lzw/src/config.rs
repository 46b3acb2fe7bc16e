//! LZW dictionary configuration.

use techarc_core::{Result, TechArcError};

/// Number of literal codes every fresh dictionary starts with.
pub const LITERAL_CODES: usize = 256;

/// LZW configuration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzwConfig {
    /// Dictionary size at which both sides reset to the literal table.
    pub max_entries: usize,
}

impl LzwConfig {
    /// Standard configuration: 4096 entries, 16-bit code words.
    pub const STANDARD: Self = Self { max_entries: 4096 };

    /// Largest dictionary addressable with 16-bit code words.
    pub const MAX_ENTRIES_LIMIT: usize = 1 << 16;

    /// Create a configuration with a custom dictionary cap.
    pub fn new(max_entries: usize) -> Result<Self> {
        let config = Self { max_entries };
        config.validate()?;
        Ok(config)
    }

    /// Check that the cap leaves room for at least one learned entry.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries <= LITERAL_CODES + 1 || self.max_entries > Self::MAX_ENTRIES_LIMIT {
            return Err(TechArcError::invalid_argument(format!(
                "LZW max_entries must be in {}..={}, got {}",
                LITERAL_CODES + 2,
                Self::MAX_ENTRIES_LIMIT,
                self.max_entries
            )));
        }
        Ok(())
    }
}

impl Default for LzwConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}
