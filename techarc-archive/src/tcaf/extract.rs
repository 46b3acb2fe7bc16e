//! Listing, extracting, verifying and repairing archives.

use super::Progress;
use super::reader::TcafReader;
use crate::attributes::FileAttributes;
use crate::recovery;
use crate::volume::VolumeReader;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use techarc_core::{Entry, Result, TechArcError};

/// Options for [`extract_archive`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Password for encrypted archives.
    pub password: Option<String>,
    /// Apply stored attribute blobs.
    pub restore_attributes: bool,
    /// Restore modification times.
    pub restore_mtime: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            password: None,
            restore_attributes: false,
            restore_mtime: true,
        }
    }
}

impl ExtractOptions {
    /// Decrypt with `password`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Apply attribute blobs.
    pub fn with_restore_attributes(mut self, restore: bool) -> Self {
        self.restore_attributes = restore;
        self
    }
}

/// Statistics of an extraction or verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files decoded.
    pub files: usize,
    /// Directories created.
    pub directories: usize,
    /// Uncompressed bytes decoded.
    pub bytes: u64,
}

/// Result of [`repair_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairSummary {
    /// Blocks rebuilt from parity.
    pub repaired_blocks: Vec<usize>,
    /// Where the repaired archive was written.
    pub output: PathBuf,
}

/// Open an archive, following volume naming when present.
pub fn open_archive(path: impl AsRef<Path>) -> Result<TcafReader<BufReader<VolumeReader>>> {
    let volumes = VolumeReader::open(path)?;
    TcafReader::new(BufReader::new(volumes))
}

/// Entry table of an archive without touching payloads.
pub fn list_entries(path: impl AsRef<Path>) -> Result<Vec<Entry>> {
    let reader = open_archive(path)?;
    Ok(reader.entries().to_vec())
}

/// [`extract_archive_with_progress`] without a callback.
pub fn extract_archive(
    archive: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    extract_archive_with_progress(archive, dest, options, |_| ControlFlow::Continue(()))
}

/// Extract every entry into `dest`.
///
/// All entry paths are checked before `dest` is created, so a hostile name
/// leaves the filesystem untouched.
pub fn extract_archive_with_progress<F>(
    archive: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: &ExtractOptions,
    mut progress: F,
) -> Result<ExtractSummary>
where
    F: FnMut(&Progress<'_>) -> ControlFlow<()>,
{
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    let mut reader = open_archive(archive)?;
    let password = options.password.as_deref();
    if reader.header().is_encrypted() && password.is_none() {
        return Err(TechArcError::PasswordRequired);
    }

    let entries = reader.entries().to_vec();
    for entry in &entries {
        entry.validate_path()?;
    }

    fs::create_dir_all(dest)?;
    log::info!(
        "extracting {} entries from {} to {}",
        entries.len(),
        archive.display(),
        dest.display()
    );

    let total = entries.len();
    let mut summary = ExtractSummary::default();
    let mut dir_times = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let target = dest.join(&entry.name);
        if entry.is_dir {
            fs::create_dir_all(&target)?;
            summary.directories += 1;
            dir_times.push((target, entry));
        } else {
            let data = reader.read_entry(index, password)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = BufWriter::new(File::create(&target)?);
            file.write_all(&data)?;
            file.flush()?;
            drop(file);

            summary.files += 1;
            summary.bytes += data.len() as u64;
            log::debug!("extracted {} ({} bytes)", entry.name, data.len());
            restore_metadata(&target, entry, options);
        }

        let event = Progress {
            index: index + 1,
            total,
            name: &entry.name,
        };
        if let ControlFlow::Break(()) = progress(&event) {
            log::info!("extraction cancelled after {} of {total} entries", index + 1);
            return Err(TechArcError::Cancelled);
        }
    }

    // Directory times last, since writing files inside them bumps the mtime.
    for (target, entry) in dir_times.into_iter().rev() {
        restore_metadata(&target, entry, options);
    }

    Ok(summary)
}

/// Best-effort: failures are logged and extraction continues.
fn restore_metadata(target: &Path, entry: &Entry, options: &ExtractOptions) {
    if options.restore_attributes {
        if let Some(blob) = &entry.attributes {
            let applied = FileAttributes::from_bytes(blob).and_then(|attrs| attrs.apply(target));
            if let Err(e) = applied {
                log::warn!("could not restore attributes of {}: {e}", entry.name);
            }
        }
    }
    if options.restore_mtime && entry.mtime > 0 {
        let mtime = FileTime::from_unix_time(entry.mtime as i64, 0);
        if let Err(e) = filetime::set_file_mtime(target, mtime) {
            log::warn!("could not restore mtime of {}: {e}", entry.name);
        }
    }
}

/// Decode every entry and check its CRC without writing anything.
pub fn verify_archive(archive: impl AsRef<Path>, password: Option<&str>) -> Result<ExtractSummary> {
    let mut reader = open_archive(archive)?;
    if reader.header().is_encrypted() && password.is_none() {
        return Err(TechArcError::PasswordRequired);
    }

    let mut summary = ExtractSummary::default();
    for index in 0..reader.entries().len() {
        if reader.entries()[index].is_dir {
            summary.directories += 1;
            continue;
        }
        let data = reader.read_entry(index, password)?;
        summary.files += 1;
        summary.bytes += data.len() as u64;
    }
    Ok(summary)
}

/// Rebuild damaged blocks from the recovery footer and write the result.
///
/// The output keeps the footer, so it can be repaired again later.
pub fn repair_archive(
    archive: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<RepairSummary> {
    let archive = archive.as_ref();
    let output = output.as_ref();

    let mut data = Vec::new();
    VolumeReader::open(archive)?.read_to_end(&mut data)?;
    let (body, footer) = recovery::split_footer(&data)?.ok_or_else(|| {
        TechArcError::invalid_argument(format!(
            "{} has no recovery record",
            archive.display()
        ))
    })?;

    let report = recovery::repair(body, &footer)?;
    let mut repaired = report.data;
    footer.append_to(&mut repaired);

    let mut file = BufWriter::new(File::create(output)?);
    file.write_all(&repaired)?;
    file.flush()?;

    log::info!(
        "repaired {} block(s) of {} into {}",
        report.repaired_blocks.len(),
        archive.display(),
        output.display()
    );
    Ok(RepairSummary {
        repaired_blocks: report.repaired_blocks,
        output: output.to_path_buf(),
    })
}
