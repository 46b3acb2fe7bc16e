//! Archive entry metadata.
//!
//! This module defines the `Entry` struct that represents a file or directory
//! recorded in a TCAF archive, along with the compression method identifiers
//! stored in the entry table.

use crate::error::{Result, TechArcError};
use std::path::{Component, Path};

/// Compression method recorded for an entry.
///
/// The discriminants are the on-disk algorithm bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression (stored).
    Stored = 0,
    /// Lempel-Ziv-Welch with 16-bit codes.
    Lzw = 1,
    /// Static Huffman coding.
    Huffman = 2,
    /// LZ77 followed by Huffman coding.
    #[default]
    Deflate = 3,
}

impl CompressionMethod {
    /// All methods in algorithm-byte order.
    pub const ALL: [CompressionMethod; 4] = [Self::Stored, Self::Lzw, Self::Huffman, Self::Deflate];

    /// The on-disk algorithm byte.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a method from its algorithm byte.
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::Stored),
            1 => Ok(Self::Lzw),
            2 => Ok(Self::Huffman),
            3 => Ok(Self::Deflate),
            other => Err(TechArcError::corrupted(
                0,
                format!("unknown algorithm id {other}"),
            )),
        }
    }

    /// Check if this method is "stored" (no compression).
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }

    /// Get the method name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stored => "STORED",
            Self::Lzw => "LZW",
            Self::Huffman => "HUFFMAN",
            Self::Deflate => "DEFLATE",
        }
    }
}

impl std::fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An entry in a TCAF archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative path inside the archive, using forward slashes.
    pub name: String,
    /// True for directory entries.
    pub is_dir: bool,
    /// Modification time in seconds since the Unix epoch.
    pub mtime: u64,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed payload size in bytes (0 for directories and solid entries).
    pub compressed_size: u64,
    /// Payload offset: absolute in per-file archives, within the
    /// decompressed stream in solid archives.
    pub offset: u64,
    /// Compression method of this entry's payload.
    pub method: CompressionMethod,
    /// CRC-32 of the uncompressed bytes (format version 3 and later).
    pub crc32: Option<u32>,
    /// Serialized file attributes, if preserved.
    pub attributes: Option<Vec<u8>>,
}

impl Entry {
    /// Create a new file entry.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            mtime: 0,
            size,
            compressed_size: 0,
            offset: 0,
            method: CompressionMethod::default(),
            crc32: None,
            attributes: None,
        }
    }

    /// Create a new directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            is_dir: true,
            method: CompressionMethod::Stored,
            ..Self::file(name, 0)
        }
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }

    /// Get the compression ratio (compressed/uncompressed).
    pub fn compression_ratio(&self) -> f64 {
        if self.size == 0 {
            1.0
        } else {
            self.compressed_size as f64 / self.size as f64
        }
    }

    /// Builder method to set compression method.
    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.method = method;
        self
    }

    /// Builder method to set compressed size.
    pub fn with_compressed_size(mut self, size: u64) -> Self {
        self.compressed_size = size;
        self
    }

    /// Builder method to set modification time.
    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = mtime;
        self
    }

    /// Builder method to set CRC-32.
    pub fn with_crc32(mut self, crc: u32) -> Self {
        self.crc32 = Some(crc);
        self
    }

    /// Builder method to set the attribute blob.
    pub fn with_attributes(mut self, attrs: Vec<u8>) -> Self {
        self.attributes = Some(attrs);
        self
    }

    /// Validate the entry path for extraction.
    ///
    /// Rejects absolute paths, drive prefixes, backslash-rooted paths,
    /// any `..` component, and embedded NUL bytes.
    pub fn validate_path(&self) -> Result<()> {
        let name = &self.name;
        if name.is_empty()
            || name.starts_with('/')
            || name.starts_with('\\')
            || name.as_bytes().get(1) == Some(&b':')
            || name.contains('\0')
        {
            return Err(TechArcError::path_traversal(name.as_str()));
        }

        for component in Path::new(name).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(TechArcError::path_traversal(name.as_str()));
                }
            }
        }
        if name.split('\\').any(|part| part == "..") {
            return Err(TechArcError::path_traversal(name.as_str()));
        }

        Ok(())
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let type_char = if self.is_dir { 'd' } else { '-' };
        write!(
            f,
            "{}{:>10} {:>10} {:>8} {}",
            type_char, self.size, self.compressed_size, self.method, self.name
        )
    }
}
