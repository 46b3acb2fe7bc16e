//! Cheap incompressibility heuristic.
//!
//! Used only to pick an algorithm faster; a wrong guess costs ratio, never
//! correctness.

use std::collections::HashSet;
use std::path::Path;

/// Extensions of formats that are already compressed or are dense media.
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "avif", "jxl", "jp2",
    // audio
    "mp3", "aac", "m4a", "ogg", "opus", "flac", "wma",
    // video
    "mp4", "m4v", "mkv", "avi", "mov", "wmv", "webm", "flv",
    // archives and compressed streams
    "zip", "gz", "tgz", "bz2", "xz", "lz", "lz4", "lzma", "zst", "7z", "rar", "cab", "tcaf",
    // documents and packages that embed compressed data
    "pdf", "docx", "xlsx", "pptx", "odt", "epub", "jar", "apk", "deb", "rpm", "dmg", "msi",
    // fonts
    "woff", "woff2",
];

/// Thresholds for [`should_skip_compression_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyConfig {
    /// Number of leading bytes inspected.
    pub sample_size: usize,
    /// Samples shorter than this are never judged by content.
    pub min_sample: usize,
    /// Unique-byte ratio above which a sample counts as incompressible.
    pub unique_ratio_threshold: f64,
}

impl EntropyConfig {
    /// 4 KiB sample, 1 KiB minimum, 0.9 threshold.
    pub const DEFAULT: Self = Self {
        sample_size: 4096,
        min_sample: 1024,
        unique_ratio_threshold: 0.9,
    };
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whether `filename` carries a known compressed or media extension.
pub fn has_compressed_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            COMPRESSED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Distinct byte values divided by `min(256, sample.len())`.
pub fn unique_byte_ratio(sample: &[u8]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<u8> = sample.iter().copied().collect();
    distinct.len() as f64 / sample.len().min(256) as f64
}

/// [`should_skip_compression_with`] using [`EntropyConfig::DEFAULT`].
pub fn should_skip_compression(sample: &[u8], filename: Option<&str>) -> bool {
    should_skip_compression_with(sample, filename, &EntropyConfig::DEFAULT)
}

/// True when compressing `sample` is unlikely to pay off.
pub fn should_skip_compression_with(
    sample: &[u8],
    filename: Option<&str>,
    config: &EntropyConfig,
) -> bool {
    if filename.is_some_and(has_compressed_extension) {
        return true;
    }

    let sample = &sample[..sample.len().min(config.sample_size)];
    if sample.len() < config.min_sample {
        return false;
    }
    unique_byte_ratio(sample) > config.unique_ratio_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(size: usize) -> Vec<u8> {
        let mut seed = 0x9E3779B97F4A7C15u64;
        (0..size)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                (seed >> 56) as u8
            })
            .collect()
    }

    #[test]
    fn test_extension_list_is_broad() {
        assert!(COMPRESSED_EXTENSIONS.len() >= 40);
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert!(should_skip_compression(b"", Some("photo.JPG")));
        assert!(should_skip_compression(b"", Some("dir/backup.tar.gz")));
        assert!(!should_skip_compression(b"", Some("notes.txt")));
        assert!(!should_skip_compression(b"", Some("Makefile")));
    }

    #[test]
    fn test_random_sample_skipped() {
        assert!(should_skip_compression(&noise(8192), None));
    }

    #[test]
    fn test_text_sample_kept() {
        let text = b"the quick brown fox jumps over the lazy dog ".repeat(100);
        assert!(!should_skip_compression(&text, None));
    }

    #[test]
    fn test_short_sample_never_skipped() {
        let all_bytes: Vec<u8> = (0..=255u8).collect();
        assert_eq!(unique_byte_ratio(&all_bytes), 1.0);
        assert!(!should_skip_compression(&all_bytes, None));
    }

    #[test]
    fn test_custom_threshold() {
        let config = EntropyConfig {
            min_sample: 16,
            unique_ratio_threshold: 0.5,
            ..EntropyConfig::DEFAULT
        };
        let sample: Vec<u8> = (0..200u8).cycle().take(400).collect();
        assert!(should_skip_compression_with(&sample, None, &config));
        assert!(!should_skip_compression_with(&sample, None, &EntropyConfig::DEFAULT));
    }
}
