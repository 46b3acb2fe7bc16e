//! Four-byte magic tags that prefix every TechArc byte stream.
//!
//! The set is closed: [`FormatTag::detect`] maps a leading tag onto one
//! variant or fails with [`TechArcError::UnknownFormat`] without looking at
//! the payload.

use crate::error::{Result, TechArcError};

/// Length of every magic tag.
pub const TAG_LEN: usize = 4;

/// Known stream and container tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// LZW code stream.
    Lzw,
    /// Huffman bit stream.
    Huffman,
    /// LZ77 + Huffman bit stream.
    Deflate,
    /// Uncompressed bytes.
    Stored,
    /// AES-GCM encryption envelope.
    Encrypted,
    /// TCAF archive container.
    Archive,
    /// Volume header of a multi-volume archive.
    Volume,
    /// Recovery record trailer.
    Recovery,
}

impl FormatTag {
    /// The four magic bytes of this tag.
    pub const fn magic(self) -> &'static [u8; TAG_LEN] {
        match self {
            Self::Lzw => b"TCZ1",
            Self::Huffman => b"TCH1",
            Self::Deflate => b"TCD1",
            Self::Stored => b"TCS1",
            Self::Encrypted => b"TCE1",
            Self::Archive => b"TCAF",
            Self::Volume => b"TCVL",
            Self::Recovery => b"TCRR",
        }
    }

    /// Match exactly four bytes against the known tags.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"TCZ1" => Some(Self::Lzw),
            b"TCH1" => Some(Self::Huffman),
            b"TCD1" => Some(Self::Deflate),
            b"TCS1" => Some(Self::Stored),
            b"TCE1" => Some(Self::Encrypted),
            b"TCAF" => Some(Self::Archive),
            b"TCVL" => Some(Self::Volume),
            b"TCRR" => Some(Self::Recovery),
            _ => None,
        }
    }

    /// Identify the tag at the start of `data`.
    pub fn detect(data: &[u8]) -> Result<Self> {
        let head = data.get(..TAG_LEN).ok_or_else(|| {
            TechArcError::corrupted(0, format!("stream shorter than {TAG_LEN}-byte tag"))
        })?;
        Self::from_magic(head).ok_or_else(|| TechArcError::unknown_format(head))
    }

    /// Split `data` into its tag and payload.
    pub fn split(data: &[u8]) -> Result<(Self, &[u8])> {
        let tag = Self::detect(data)?;
        Ok((tag, &data[TAG_LEN..]))
    }

    /// Prefix `payload` with this tag.
    pub fn wrap(self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(TAG_LEN + payload.len());
        out.extend_from_slice(self.magic());
        out.extend_from_slice(payload);
        out
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.magic()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_tags() {
        assert_eq!(FormatTag::detect(b"TCZ1\x00\x41").unwrap(), FormatTag::Lzw);
        assert_eq!(FormatTag::detect(b"TCAF").unwrap(), FormatTag::Archive);

        let (tag, payload) = FormatTag::split(b"TCH1xyz").unwrap();
        assert_eq!(tag, FormatTag::Huffman);
        assert_eq!(payload, b"xyz");
    }

    #[test]
    fn test_unknown_tag() {
        let err = FormatTag::detect(b"PK\x03\x04rest").unwrap_err();
        assert!(matches!(err, TechArcError::UnknownFormat { .. }));
    }

    #[test]
    fn test_short_input() {
        let err = FormatTag::detect(b"TC").unwrap_err();
        assert!(matches!(err, TechArcError::CorruptData { .. }));
    }

    #[test]
    fn test_wrap_roundtrip() {
        let blob = FormatTag::Stored.wrap(b"abc");
        assert_eq!(&blob[..4], b"TCS1");
        assert_eq!(FormatTag::split(&blob).unwrap().1, b"abc");
    }
}
