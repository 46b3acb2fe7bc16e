//! Error types for TechArc operations.
//!
//! One error enum covers every layer of the toolkit: bit-level decoding,
//! the three codecs, the encryption envelope, and the TCAF container with
//! its volume and recovery extensions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for TechArc operations.
#[derive(Debug, Error)]
pub enum TechArcError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corrupted or truncated compressed data.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptData {
        /// Byte (or bit, for bit streams) offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A bit reader ran past the last meaningful bit.
    #[error("Out of data: needed {needed} more bits")]
    OutOfData {
        /// Number of bits requested beyond the end of the stream.
        needed: u32,
    },

    /// The leading magic tag is not one this toolkit understands.
    #[error("Unknown format tag: {found:02x?}")]
    UnknownFormat {
        /// The bytes found where a magic tag was expected.
        found: Vec<u8>,
    },

    /// Caller asked for one algorithm but the blob carries another.
    #[error("Algorithm mismatch: expected {expected}, found {found}")]
    AlgorithmMismatch {
        /// The algorithm the caller requested.
        expected: String,
        /// The algorithm named by the blob's tag.
        found: String,
    },

    /// Authentication failed: wrong password or tampered ciphertext.
    #[error("Wrong password or corrupted encrypted data")]
    WrongPassword,

    /// Encrypted data was supplied without a password.
    #[error("Data is encrypted but no password was provided")]
    PasswordRequired,

    /// An entry path would escape the extraction directory.
    #[error("Path traversal rejected: {path}")]
    PathTraversalRejected {
        /// The offending entry path.
        path: String,
    },

    /// A symbolic link was found in the source tree.
    #[error("Symbolic link rejected: {}", path.display())]
    SymlinkRejected {
        /// Location of the link.
        path: PathBuf,
    },

    /// The archive would be written inside the directory being archived.
    #[error("Archive path {} lies inside source directory {}", archive.display(), directory.display())]
    RecursiveArchiveRejected {
        /// The archive output path.
        archive: PathBuf,
        /// The directory being archived.
        directory: PathBuf,
    },

    /// A volume of a multi-volume set is absent.
    #[error("Missing volume {index}: {}", path.display())]
    MissingVolume {
        /// 1-based index of the absent volume.
        index: u32,
        /// Expected location of the volume.
        path: PathBuf,
    },

    /// A volume header disagrees with its position in the set.
    #[error("Volume order mismatch: {message}")]
    VolumeOrderMismatch {
        /// Description of the inconsistency.
        message: String,
    },

    /// A recovery group has more damage than parity can repair.
    #[error("Unrecoverable damage in recovery group {group}")]
    Unrecoverable {
        /// Index of the damaged group.
        group: usize,
    },

    /// CRC checksum mismatch.
    #[error("CRC mismatch for {name}: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// Entry name.
        name: String,
        /// Expected CRC value from archive.
        expected: u32,
        /// Computed CRC value from data.
        computed: u32,
    },

    /// Container version this build cannot read.
    #[error("Unsupported {format} version {version}")]
    UnsupportedVersion {
        /// Container name.
        format: &'static str,
        /// Version byte found.
        version: u8,
    },

    /// An argument is outside its valid range.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The operation was cancelled by a progress callback.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for TechArc operations.
pub type Result<T> = std::result::Result<T, TechArcError>;

impl TechArcError {
    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptData {
            offset,
            message: message.into(),
        }
    }

    /// Create an out-of-data error.
    pub fn out_of_data(needed: u32) -> Self {
        Self::OutOfData { needed }
    }

    /// Create an unknown format error.
    pub fn unknown_format(found: impl Into<Vec<u8>>) -> Self {
        Self::UnknownFormat {
            found: found.into(),
        }
    }

    /// Create an algorithm mismatch error.
    pub fn algorithm_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::AlgorithmMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a path traversal error.
    pub fn path_traversal(path: impl Into<String>) -> Self {
        Self::PathTraversalRejected { path: path.into() }
    }

    /// Create a volume order error.
    pub fn volume_order(message: impl Into<String>) -> Self {
        Self::VolumeOrderMismatch {
            message: message.into(),
        }
    }

    /// Create a CRC mismatch error.
    pub fn crc_mismatch(name: impl Into<String>, expected: u32, computed: u32) -> Self {
        Self::CrcMismatch {
            name: name.into(),
            expected,
            computed,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// True for errors that indicate damaged input rather than misuse.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptData { .. } | Self::OutOfData { .. } | Self::CrcMismatch { .. }
        )
    }
}
