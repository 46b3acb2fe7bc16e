//! TCAF archive container.
//!
//! ```text
//! header | entry table | payloads (or one solid payload) | [recovery footer]
//! ```
//!
//! Per-file payloads are dispatcher blobs (`TCZ1`/`TCH1`/`TCD1`, wrapped in
//! `TCE1` when encrypted) or raw bytes for unencrypted STORED entries.

mod create;
mod extract;
pub mod header;
mod reader;
mod writer;

pub use create::{
    ArchiveSummary, CreateOptions, DEFAULT_CHUNK_THRESHOLD, create_archive,
    create_archive_with_progress,
};
pub use extract::{
    ExtractOptions, ExtractSummary, RepairSummary, extract_archive, extract_archive_with_progress,
    list_entries, open_archive, repair_archive, verify_archive,
};
pub use header::{ArchiveHeader, MIN_TCAF_VERSION, TCAF_VERSION};
pub use reader::{TcafReader, decode_payload};
pub use writer::{ArchiveBuilder, TcafWriter};

/// Progress event passed to create and extract callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    /// Entries processed so far, including this one.
    pub index: usize,
    /// Total number of entries.
    pub total: usize,
    /// Name of the entry just processed.
    pub name: &'a str,
}
