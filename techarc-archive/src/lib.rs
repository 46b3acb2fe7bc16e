//! # TechArc Archive
//!
//! Everything above the codecs:
//!
//! - **entropy**: decides when compression is pointless
//! - **dispatch**: algorithm selection, tagged blobs and AES-GCM encryption
//! - **tcaf**: the TCAF archive container (create, list, extract, verify)
//! - **volume**: splitting an archive across `.partN` files
//! - **recovery**: XOR parity records that repair damaged blocks
//!
//! ## Example
//!
//! ```rust,no_run
//! use techarc_archive::{CreateOptions, ExtractOptions, create_archive, extract_archive};
//!
//! let options = CreateOptions::default().with_recovery_percent(10);
//! let summary = create_archive("project", "project.tcaf", &options).unwrap();
//! println!("{} files, {} bytes", summary.files, summary.archive_size);
//!
//! extract_archive("project.tcaf", "restored", &ExtractOptions::default()).unwrap();
//! ```
//!
//! ## In-memory compression
//!
//! ```rust
//! use techarc_archive::dispatch::{Algorithm, compress, decompress};
//!
//! let data = b"TOBEORNOTTOBEORTOBEORNOT".repeat(10);
//! let blob = compress(&data, Algorithm::Auto, Some("secret")).unwrap();
//! assert_eq!(decompress(&blob, Algorithm::Auto, Some("secret")).unwrap(), data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod attributes;
pub mod crypto;
pub mod dispatch;
pub mod entropy;
pub mod recovery;
pub mod tcaf;
pub mod volume;

// Re-exports
pub use attributes::FileAttributes;
pub use dispatch::{Algorithm, AutoConfig};
pub use entropy::EntropyConfig;
pub use recovery::{RecoveryEncoder, RecoveryFooter, RecoveryInfo, RepairReport};
pub use tcaf::{
    ArchiveBuilder, ArchiveHeader, ArchiveSummary, CreateOptions, ExtractOptions, ExtractSummary,
    Progress, RepairSummary, TcafReader, TcafWriter, create_archive, create_archive_with_progress,
    extract_archive, extract_archive_with_progress, list_entries, open_archive, repair_archive,
    verify_archive,
};
pub use techarc_core::{CompressionMethod, Entry, Result, TechArcError};
pub use volume::{VolumeReader, VolumeWriter};
