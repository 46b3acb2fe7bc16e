//! Algorithm selection and tagged-blob dispatch.
//!
//! [`compress`] produces `tag | payload`, optionally wrapped in a `TCE1`
//! envelope. [`decompress`] reverses it with one exhaustive match over
//! [`FormatTag`].
//!
//! # Example
//!
//! ```rust
//! use techarc_archive::dispatch::{Algorithm, compress, decompress};
//!
//! let blob = compress(b"hello hello hello", Algorithm::Lzw, None).unwrap();
//! assert_eq!(&blob[..4], b"TCZ1");
//! let plain = decompress(&blob, Algorithm::Auto, None).unwrap();
//! assert_eq!(plain, b"hello hello hello");
//! ```

use crate::crypto;
use crate::entropy::{EntropyConfig, should_skip_compression_with};
use std::fmt;
use std::str::FromStr;
use techarc_core::{Codec, CompressionMethod, FormatTag, Result, StoredCodec, TechArcError};
use techarc_deflate::DeflateCodec;
use techarc_huffman::HuffmanCodec;
use techarc_lzw::LzwCodec;

/// Algorithm requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// LZW with 16-bit codes.
    Lzw,
    /// Static Huffman.
    Huffman,
    /// LZ77 + Huffman.
    Deflate,
    /// No compression.
    Stored,
    /// Pick by size and entropy.
    #[default]
    Auto,
}

impl Algorithm {
    /// Every variant, in display order.
    pub const ALL: [Self; 5] = [
        Self::Lzw,
        Self::Huffman,
        Self::Deflate,
        Self::Stored,
        Self::Auto,
    ];

    /// Concrete method, or `None` for [`Algorithm::Auto`].
    pub fn method(self) -> Option<CompressionMethod> {
        match self {
            Self::Lzw => Some(CompressionMethod::Lzw),
            Self::Huffman => Some(CompressionMethod::Huffman),
            Self::Deflate => Some(CompressionMethod::Deflate),
            Self::Stored => Some(CompressionMethod::Stored),
            Self::Auto => None,
        }
    }

    /// Upper-case name used at the string boundary.
    pub fn name(self) -> &'static str {
        match self.method() {
            Some(method) => method.name(),
            None => "AUTO",
        }
    }

    /// Resolve to a concrete method, consulting the heuristics for `Auto`.
    ///
    /// With `encrypted` set, `Auto` picks LZW where it would otherwise pick
    /// STORED.
    pub fn resolve(
        self,
        data: &[u8],
        filename: Option<&str>,
        config: &AutoConfig,
        encrypted: bool,
    ) -> CompressionMethod {
        self.resolve_sized(data, data.len() as u64, filename, config, encrypted)
    }

    /// [`resolve`](Self::resolve) for a `size`-byte input of which only the
    /// leading `sample` is in memory.
    pub fn resolve_sized(
        self,
        sample: &[u8],
        size: u64,
        filename: Option<&str>,
        config: &AutoConfig,
        encrypted: bool,
    ) -> CompressionMethod {
        match self.method() {
            Some(method) => method,
            None => match resolve_auto_sized(sample, size, filename, config) {
                CompressionMethod::Stored if encrypted => CompressionMethod::Lzw,
                method => method,
            },
        }
    }
}

impl From<CompressionMethod> for Algorithm {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::Stored => Self::Stored,
            CompressionMethod::Lzw => Self::Lzw,
            CompressionMethod::Huffman => Self::Huffman,
            CompressionMethod::Deflate => Self::Deflate,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = TechArcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TechArcError::invalid_argument(format!("unknown algorithm '{s}'")))
    }
}

/// Size and entropy thresholds for [`Algorithm::Auto`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoConfig {
    /// Inputs up to this size use LZ77 + Huffman.
    pub deflate_max_size: u64,
    /// Inputs up to this size (and above `deflate_max_size`) use Huffman.
    pub huffman_max_size: u64,
    /// Incompressibility heuristic.
    pub entropy: EntropyConfig,
}

impl AutoConfig {
    /// 5 MiB / 50 MiB thresholds.
    pub const DEFAULT: Self = Self {
        deflate_max_size: 5 * 1024 * 1024,
        huffman_max_size: 50 * 1024 * 1024,
        entropy: EntropyConfig::DEFAULT,
    };
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Pick a method for `data`.
///
/// Incompressible-looking input is STORED; otherwise the choice falls back
/// from DEFLATE to Huffman to LZW as input grows.
pub fn resolve_auto(
    data: &[u8],
    filename: Option<&str>,
    config: &AutoConfig,
) -> CompressionMethod {
    resolve_auto_sized(data, data.len() as u64, filename, config)
}

/// [`resolve_auto`] from a leading `sample` of a `size`-byte input.
pub fn resolve_auto_sized(
    sample: &[u8],
    size: u64,
    filename: Option<&str>,
    config: &AutoConfig,
) -> CompressionMethod {
    let method = if should_skip_compression_with(sample, filename, &config.entropy) {
        CompressionMethod::Stored
    } else if size <= config.deflate_max_size {
        CompressionMethod::Deflate
    } else if size <= config.huffman_max_size {
        CompressionMethod::Huffman
    } else {
        CompressionMethod::Lzw
    };
    log::debug!("auto selected {method} for {size} bytes ({filename:?})");
    method
}

/// Compress with one concrete method and prepend its tag.
pub fn encode(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => StoredCodec.compress_tagged(data),
        CompressionMethod::Lzw => LzwCodec.compress_tagged(data),
        CompressionMethod::Huffman => HuffmanCodec.compress_tagged(data),
        CompressionMethod::Deflate => DeflateCodec::default().compress_tagged(data),
    }
}

/// Decode an untagged payload of a known method.
pub fn decode(payload: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => StoredCodec.decompress(payload),
        CompressionMethod::Lzw => LzwCodec.decompress(payload),
        CompressionMethod::Huffman => HuffmanCodec.decompress(payload),
        CompressionMethod::Deflate => DeflateCodec::default().decompress(payload),
    }
}

/// [`compress_with_config`] with [`AutoConfig::DEFAULT`].
pub fn compress(data: &[u8], algorithm: Algorithm, password: Option<&str>) -> Result<Vec<u8>> {
    compress_with_config(data, algorithm, password, &AutoConfig::DEFAULT)
}

/// Compress `data` into a tagged blob, encrypting the whole blob when a
/// password is given.
pub fn compress_with_config(
    data: &[u8],
    algorithm: Algorithm,
    password: Option<&str>,
    config: &AutoConfig,
) -> Result<Vec<u8>> {
    let method = algorithm.resolve(data, None, config, password.is_some());
    compress_method(data, method, password)
}

/// Compress with a resolved method, encrypting when a password is given.
pub fn compress_method(
    data: &[u8],
    method: CompressionMethod,
    password: Option<&str>,
) -> Result<Vec<u8>> {
    let tagged = encode(data, method)?;
    match password {
        Some(password) => crypto::encrypt(&tagged, password),
        None => Ok(tagged),
    }
}

/// Decompress a tagged, possibly encrypted blob.
///
/// `expected` other than [`Algorithm::Auto`] must match the embedded tag.
pub fn decompress(data: &[u8], expected: Algorithm, password: Option<&str>) -> Result<Vec<u8>> {
    let (tag, payload) = FormatTag::split(data)?;
    if tag == FormatTag::Encrypted {
        let password = password.ok_or(TechArcError::PasswordRequired)?;
        let inner = crypto::decrypt(data, password)?;
        let (inner_tag, inner_payload) = FormatTag::split(&inner)?;
        return decode_tagged(inner_tag, inner_payload, expected);
    }
    decode_tagged(tag, payload, expected)
}

fn decode_tagged(tag: FormatTag, payload: &[u8], expected: Algorithm) -> Result<Vec<u8>> {
    let method = match tag {
        FormatTag::Lzw => CompressionMethod::Lzw,
        FormatTag::Huffman => CompressionMethod::Huffman,
        FormatTag::Deflate => CompressionMethod::Deflate,
        FormatTag::Stored => CompressionMethod::Stored,
        FormatTag::Encrypted => {
            return Err(TechArcError::corrupted(0, "nested encryption envelope"));
        }
        FormatTag::Archive | FormatTag::Volume | FormatTag::Recovery => {
            return Err(TechArcError::unknown_format(tag.magic().as_slice()));
        }
    };

    if let Some(wanted) = expected.method() {
        if wanted != method {
            return Err(TechArcError::algorithm_mismatch(wanted.name(), method.name()));
        }
    }

    decode(payload, method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("lzw".parse::<Algorithm>().unwrap(), Algorithm::Lzw);
        assert_eq!("HUFFMAN".parse::<Algorithm>().unwrap(), Algorithm::Huffman);
        assert_eq!("Deflate".parse::<Algorithm>().unwrap(), Algorithm::Deflate);
        assert_eq!(" stored ".parse::<Algorithm>().unwrap(), Algorithm::Stored);
        assert_eq!("auto".parse::<Algorithm>().unwrap(), Algorithm::Auto);
        assert!("zstd".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_auto_thresholds() {
        let config = AutoConfig {
            deflate_max_size: 10,
            huffman_max_size: 20,
            entropy: EntropyConfig::DEFAULT,
        };
        assert_eq!(resolve_auto(b"small", None, &config), CompressionMethod::Deflate);
        assert_eq!(resolve_auto(&[b'a'; 15], None, &config), CompressionMethod::Huffman);
        assert_eq!(resolve_auto(&[b'a'; 25], None, &config), CompressionMethod::Lzw);
        assert_eq!(
            resolve_auto(b"small", Some("movie.mp4"), &config),
            CompressionMethod::Stored
        );
        assert_eq!(
            resolve_auto_sized(b"head", 15, None, &config),
            CompressionMethod::Huffman
        );
    }

    #[test]
    fn test_auto_avoids_stored_when_encrypted() {
        let config = AutoConfig::DEFAULT;
        let plain = Algorithm::Auto.resolve(b"clip", Some("clip.mp4"), &config, false);
        assert_eq!(plain, CompressionMethod::Stored);
        let sealed = Algorithm::Auto.resolve(b"clip", Some("clip.mp4"), &config, true);
        assert_eq!(sealed, CompressionMethod::Lzw);
        let explicit = Algorithm::Stored.resolve(b"clip", None, &config, true);
        assert_eq!(explicit, CompressionMethod::Stored);
    }

    #[test]
    fn test_every_method_roundtrips() {
        let data = b"abracadabra abracadabra abracadabra";
        for method in CompressionMethod::ALL {
            let blob = compress(data, Algorithm::from(method), None).unwrap();
            assert_eq!(FormatTag::detect(&blob).unwrap().magic(), &blob[..4]);
            assert_eq!(decompress(&blob, Algorithm::from(method), None).unwrap(), data);
        }
    }

    #[test]
    fn test_algorithm_mismatch() {
        let blob = compress(b"data", Algorithm::Huffman, None).unwrap();
        let err = decompress(&blob, Algorithm::Lzw, None).unwrap_err();
        assert!(matches!(err, TechArcError::AlgorithmMismatch { .. }));
    }

    #[test]
    fn test_container_tags_rejected() {
        let err = decompress(b"TCAF\x03rest", Algorithm::Auto, None).unwrap_err();
        assert!(matches!(err, TechArcError::UnknownFormat { .. }));
    }

    #[test]
    fn test_password_required() {
        let blob = compress(b"data", Algorithm::Lzw, Some("pw")).unwrap();
        assert!(matches!(
            decompress(&blob, Algorithm::Auto, None),
            Err(TechArcError::PasswordRequired)
        ));
    }

    #[test]
    fn test_nested_envelope_rejected() {
        let inner = compress(b"data", Algorithm::Lzw, Some("pw")).unwrap();
        let outer = crypto::encrypt(&inner, "pw").unwrap();
        let err = decompress(&outer, Algorithm::Auto, Some("pw")).unwrap_err();
        assert!(matches!(err, TechArcError::CorruptData { .. }));
    }
}
