//! Building an archive from a directory tree.
//!
//! Per-file payloads are encoded in parallel batches and spooled to a
//! temporary file next to the archive, so only one batch of encoded
//! payloads is in memory at a time. The archive is then streamed to its
//! destination while the recovery record is computed on the way out.
//! Solid archives compress the whole stream in memory.

use super::header::{ArchiveHeader, FLAG_ATTRIBUTES, FLAG_ENCRYPTED, FLAG_INCREMENTAL};
use super::writer::{ArchiveBuilder, TcafWriter};
use super::{Progress, list_entries};
use crate::attributes::FileAttributes;
use crate::dispatch::{self, Algorithm, AutoConfig};
use crate::recovery::RecoveryEncoder;
use crate::volume::{self, VolumeWriter};
use crossbeam_channel::{Sender, bounded};
use glob::Pattern;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::UNIX_EPOCH;
use techarc_core::{CompressionMethod, Crc32, Entry, FormatTag, Result, TechArcError};
use walkdir::WalkDir;

/// Unencrypted files above this size that resolve to STORED are copied
/// into the archive in chunks instead of being loaded whole.
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 16 * 1024 * 1024;

const READ_CHUNK: usize = 1024 * 1024;

/// Options for [`create_archive`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Algorithm for every payload.
    pub algorithm: Algorithm,
    /// Encrypt payloads with this password.
    pub password: Option<String>,
    /// Compress all files as one stream.
    pub solid: bool,
    /// Glob patterns matched against relative paths and file names.
    pub exclude: Vec<String>,
    /// Skip files smaller than this.
    pub min_size: Option<u64>,
    /// Skip files larger than this.
    pub max_size: Option<u64>,
    /// Only include entries newer than in this archive.
    pub incremental_base: Option<PathBuf>,
    /// Recovery record size in percent of the archive (0 = none).
    pub recovery_percent: u8,
    /// Free-text comment.
    pub comment: String,
    /// Creator string.
    pub creator: String,
    /// Record file attributes.
    pub preserve_attributes: bool,
    /// Split output into volumes of this size.
    pub volume_size: Option<u64>,
    /// AUTO thresholds.
    pub auto: AutoConfig,
    /// Unencrypted files above this size that resolve to STORED are copied
    /// in chunks.
    pub chunk_threshold: u64,
    /// Files compressed per parallel batch.
    pub batch_size: usize,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Auto,
            password: None,
            solid: false,
            exclude: Vec::new(),
            min_size: None,
            max_size: None,
            incremental_base: None,
            recovery_percent: 0,
            comment: String::new(),
            creator: concat!("TechArc ", env!("CARGO_PKG_VERSION")).to_string(),
            preserve_attributes: false,
            volume_size: None,
            auto: AutoConfig::DEFAULT,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            batch_size: 64,
        }
    }
}

impl CreateOptions {
    /// Set the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Encrypt with `password`.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enable solid mode.
    pub fn with_solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }

    /// Add an exclude pattern.
    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Make an incremental archive against `base`.
    pub fn with_incremental_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.incremental_base = Some(base.into());
        self
    }

    /// Append a recovery record.
    pub fn with_recovery_percent(mut self, percent: u8) -> Self {
        self.recovery_percent = percent;
        self
    }

    /// Split into volumes.
    pub fn with_volume_size(mut self, size: u64) -> Self {
        self.volume_size = Some(size);
        self
    }

    /// Set the size above which stored files are streamed.
    pub fn with_chunk_threshold(mut self, threshold: u64) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    /// Set the number of files encoded per parallel batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Statistics of a created archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Files written.
    pub files: usize,
    /// Directories written.
    pub directories: usize,
    /// Entries left out by filters or incremental mode.
    pub skipped: usize,
    /// Files kept uncompressed.
    pub stored: usize,
    /// Total size of the input files.
    pub original_size: u64,
    /// Size of the archive including any recovery record.
    pub archive_size: u64,
    /// Physical files written.
    pub volumes: u32,
    /// Output paths.
    pub paths: Vec<PathBuf>,
}

impl ArchiveSummary {
    /// Archive size divided by input size.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.archive_size as f64 / self.original_size as f64
    }
}

#[derive(Debug)]
enum SourceItem {
    Directory(Entry),
    File {
        entry: Entry,
        path: PathBuf,
    },
}

impl SourceItem {
    fn name(&self) -> &str {
        match self {
            Self::Directory(entry) | Self::File { entry, .. } => &entry.name,
        }
    }
}

/// A per-file payload on its way to the spool.
#[derive(Debug)]
enum Payload {
    /// Encoded in memory.
    Encoded(Vec<u8>),
    /// Copied raw from the source file in chunks.
    Streamed(PathBuf),
}

#[derive(Debug)]
struct EncodedFile {
    entry: Entry,
    payload: Payload,
}

type Encoded = (usize, Result<Option<EncodedFile>>);

/// [`create_archive_with_progress`] without a callback.
pub fn create_archive(
    source: impl AsRef<Path>,
    archive: impl AsRef<Path>,
    options: &CreateOptions,
) -> Result<ArchiveSummary> {
    create_archive_with_progress(source, archive, options, |_| ControlFlow::Continue(()))
}

/// Archive `source` (a directory or a single file) into `archive`.
///
/// `progress` runs after each entry, in archive order; returning `Break`
/// stops with `Cancelled` and writes nothing. Volumes or a plain archive
/// left at the same path by an earlier run are removed once the new
/// archive is complete.
pub fn create_archive_with_progress<F>(
    source: impl AsRef<Path>,
    archive: impl AsRef<Path>,
    options: &CreateOptions,
    mut progress: F,
) -> Result<ArchiveSummary>
where
    F: FnMut(&Progress<'_>) -> ControlFlow<()>,
{
    let source = source.as_ref();
    let archive = archive.as_ref();

    let meta = fs::symlink_metadata(source)?;
    if meta.file_type().is_symlink() {
        return Err(TechArcError::SymlinkRejected {
            path: source.to_path_buf(),
        });
    }
    if meta.is_dir() {
        check_recursion(source, archive)?;
    }
    if options.recovery_percent > 100 {
        return Err(TechArcError::invalid_argument(format!(
            "recovery percent {} outside 0-100",
            options.recovery_percent
        )));
    }
    let password = options.password.as_deref();
    if password == Some("") {
        return Err(TechArcError::invalid_argument("password cannot be empty"));
    }

    let base_mtimes = match &options.incremental_base {
        Some(base) => list_entries(base)?
            .into_iter()
            .map(|e| (e.name, e.mtime))
            .collect(),
        None => HashMap::new(),
    };

    let (items, skipped) = scan_source(source, options, &base_mtimes)?;
    log::info!(
        "archiving {} entries from {} ({skipped} skipped)",
        items.len(),
        source.display()
    );

    let default_method = options.algorithm.method().unwrap_or_default();
    let mut header = ArchiveHeader::new(default_method);
    header.set_flag(FLAG_ENCRYPTED, password.is_some());
    header.set_flag(FLAG_INCREMENTAL, options.incremental_base.is_some());
    header.set_flag(FLAG_ATTRIBUTES, options.preserve_attributes);
    header.creator = options.creator.clone();
    header.comment = options.comment.clone();

    let mut builder = ArchiveBuilder::new(header);
    let mut summary = ArchiveSummary {
        skipped,
        ..ArchiveSummary::default()
    };

    let spool = if options.solid {
        build_solid(&items, options, &mut builder, &mut summary, &mut progress)?;
        None
    } else {
        let spool = build_per_file(
            &items,
            options,
            &mut builder,
            &mut summary,
            &spool_dir(archive),
            &mut progress,
        )?;
        Some(spool)
    };

    let output = Output::create(archive, options.volume_size)?;
    let mut sink = ArchiveSink::new(output, options.recovery_percent)?;
    let mut writer = TcafWriter::new(&mut sink);
    match spool {
        Some(spool) => writer.write_archive_with(&builder, &mut BufReader::new(spool))?,
        None => writer.write_archive(&builder)?,
    };
    writer.into_inner()?;
    let (output, archive_size) = sink.finish()?;
    summary.archive_size = archive_size;
    summary.paths = output.finish()?;
    summary.volumes = summary.paths.len() as u32;
    remove_stale_outputs(archive, options.volume_size.map(|_| summary.volumes))?;

    log::info!(
        "created {}: {} files, {} dirs, {} -> {} bytes",
        archive.display(),
        summary.files,
        summary.directories,
        summary.original_size,
        summary.archive_size
    );
    Ok(summary)
}

/// Directory for the payload spool: the archive's own directory.
fn spool_dir(archive: &Path) -> PathBuf {
    match archive.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// The physical destination: one file or a volume set.
#[derive(Debug)]
enum Output {
    Plain(BufWriter<File>, PathBuf),
    Split(VolumeWriter),
}

impl Output {
    fn create(archive: &Path, volume_size: Option<u64>) -> Result<Self> {
        match volume_size {
            Some(size) => Ok(Self::Split(VolumeWriter::create(archive, size)?)),
            None => Ok(Self::Plain(
                BufWriter::new(File::create(archive)?),
                archive.to_path_buf(),
            )),
        }
    }

    fn finish(self) -> Result<Vec<PathBuf>> {
        match self {
            Self::Plain(mut file, path) => {
                file.flush()?;
                Ok(vec![path])
            }
            Self::Split(writer) => writer.finish(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(file, _) => file.write(buf),
            Self::Split(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(file, _) => file.flush(),
            Self::Split(writer) => writer.flush(),
        }
    }
}

/// Forwards archive bytes and feeds them to the recovery encoder.
struct ArchiveSink<W: Write> {
    inner: W,
    recovery: Option<RecoveryEncoder>,
    written: u64,
}

impl<W: Write> ArchiveSink<W> {
    fn new(inner: W, recovery_percent: u8) -> Result<Self> {
        let recovery = match recovery_percent {
            0 => None,
            percent => Some(RecoveryEncoder::new(percent)?),
        };
        Ok(Self {
            inner,
            recovery,
            written: 0,
        })
    }

    /// Append the recovery footer, if any. Returns the sink and the total
    /// archive size.
    fn finish(mut self) -> Result<(W, u64)> {
        if let Some(encoder) = self.recovery.take() {
            let mut footer = Vec::new();
            encoder.finish().write_to(&mut footer)?;
            self.inner.write_all(&footer)?;
            self.written += footer.len() as u64;
        }
        self.inner.flush()?;
        Ok((self.inner, self.written))
    }
}

impl<W: Write> Write for ArchiveSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(encoder) = self.recovery.as_mut() {
            encoder.update(&buf[..n]);
        }
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Remove what an earlier archive at the same path left behind: volumes
/// beyond the new set, or every volume when the new archive is plain, and a
/// plain archive shadowing a new volume set.
fn remove_stale_outputs(archive: &Path, volumes: Option<u32>) -> Result<()> {
    let removed = volume::remove_stale_volumes(archive, volumes.unwrap_or(0))?;
    if !removed.is_empty() {
        log::info!("removed {} stale volumes of {}", removed.len(), archive.display());
    }
    if volumes.is_some() && starts_with_tag(archive, FormatTag::Archive) {
        fs::remove_file(archive)?;
        log::info!("removed stale archive {}", archive.display());
    }
    Ok(())
}

fn starts_with_tag(path: &Path, tag: FormatTag) -> bool {
    let mut magic = [0u8; 4];
    path.is_file()
        && File::open(path)
            .and_then(|mut file| file.read_exact(&mut magic))
            .is_ok()
        && &magic == tag.magic()
}

fn build_per_file<F>(
    items: &[SourceItem],
    options: &CreateOptions,
    builder: &mut ArchiveBuilder,
    summary: &mut ArchiveSummary,
    spool_dir: &Path,
    progress: &mut F,
) -> Result<File>
where
    F: FnMut(&Progress<'_>) -> ControlFlow<()>,
{
    let mut spool = BufWriter::new(tempfile::tempfile_in(spool_dir)?);
    let total = items.len();
    let cancelled = AtomicBool::new(false);
    let mut done = 0;

    for batch in items.chunks(options.batch_size.max(1)) {
        thread::scope(|scope| -> Result<()> {
            let (tx, rx) = bounded::<Encoded>(rayon::current_num_threads() * 2);
            let cancelled = &cancelled;
            scope.spawn(move || encode_batch(batch, options, cancelled, tx));

            // Results arrive in completion order; entries are added in
            // traversal order.
            let mut pending = BTreeMap::new();
            let mut next = 0;
            for (position, encoded) in &rx {
                pending.insert(position, encoded);
                while let Some(encoded) = pending.remove(&next) {
                    let item = &batch[next];
                    next += 1;
                    done += 1;
                    let outcome = encoded
                        .and_then(|encoded| accept(item, encoded, builder, summary, &mut spool))
                        .and_then(|()| report(progress, done, total, item));
                    if let Err(err) = outcome {
                        cancelled.store(true, Ordering::Relaxed);
                        return Err(err);
                    }
                }
            }
            Ok(())
        })?;
    }

    let mut spool = spool.into_inner().map_err(|e| e.into_error())?;
    spool.seek(SeekFrom::Start(0))?;
    Ok(spool)
}

/// Encode `batch` in parallel, sending `(position, result)` as each item
/// finishes. Items not yet started once `cancelled` is set are skipped.
fn encode_batch(
    batch: &[SourceItem],
    options: &CreateOptions,
    cancelled: &AtomicBool,
    tx: Sender<Encoded>,
) {
    batch
        .par_iter()
        .enumerate()
        .for_each_with(tx, |tx, (position, item)| {
            if cancelled.load(Ordering::Relaxed) {
                return;
            }
            let encoded = match item {
                SourceItem::Directory(_) => Ok(None),
                SourceItem::File { entry, path } => encode_file(entry, path, options).map(Some),
            };
            if tx.send((position, encoded)).is_err() {
                cancelled.store(true, Ordering::Relaxed);
            }
        });
}

/// Add one finished item to the builder, spooling its payload.
fn accept<W: Write>(
    item: &SourceItem,
    encoded: Option<EncodedFile>,
    builder: &mut ArchiveBuilder,
    summary: &mut ArchiveSummary,
    spool: &mut W,
) -> Result<()> {
    match (item, encoded) {
        (SourceItem::Directory(entry), _) => {
            summary.directories += 1;
            builder.add_directory(entry.clone());
        }
        (SourceItem::File { .. }, Some(EncodedFile { mut entry, payload })) => {
            let len = match payload {
                Payload::Encoded(bytes) => {
                    spool.write_all(&bytes)?;
                    bytes.len() as u64
                }
                Payload::Streamed(path) => {
                    let (len, crc) = copy_source(&path, spool)?;
                    entry.size = len;
                    entry.crc32 = Some(crc);
                    len
                }
            };
            summary.files += 1;
            summary.original_size += entry.size;
            if entry.method.is_stored() {
                summary.stored += 1;
            }
            builder.add_spooled_file(entry, len);
        }
        (SourceItem::File { .. }, None) => {}
    }
    Ok(())
}

fn build_solid<F>(
    items: &[SourceItem],
    options: &CreateOptions,
    builder: &mut ArchiveBuilder,
    summary: &mut ArchiveSummary,
    progress: &mut F,
) -> Result<()>
where
    F: FnMut(&Progress<'_>) -> ControlFlow<()>,
{
    let total = items.len();
    let mut stream = Vec::new();
    let mut members = Vec::with_capacity(items.len());

    for (i, item) in items.iter().enumerate() {
        match item {
            SourceItem::Directory(entry) => {
                summary.directories += 1;
                members.push(entry.clone());
            }
            SourceItem::File { entry, path } => {
                let data = fs::read(path)?;
                let mut entry = entry.clone().with_crc32(Crc32::compute(&data));
                entry.offset = stream.len() as u64;
                entry.size = data.len() as u64;
                stream.extend_from_slice(&data);
                summary.files += 1;
                summary.original_size += entry.size;
                members.push(entry);
            }
        }
        report(progress, i + 1, total, item)?;
    }

    let password = options.password.as_deref();
    let method = options
        .algorithm
        .resolve(&stream, None, &options.auto, password.is_some());
    let (method, payload) = encode_with_fallback(&stream, method, password)?;
    log::debug!(
        "solid stream: {} -> {} bytes ({method})",
        stream.len(),
        payload.len()
    );

    for mut entry in members {
        if entry.is_dir {
            builder.add_directory(entry);
        } else {
            entry.method = method;
            builder.add_solid_member(entry);
        }
    }
    builder.set_solid_payload(method, payload);
    Ok(())
}

fn report<F>(progress: &mut F, index: usize, total: usize, item: &SourceItem) -> Result<()>
where
    F: FnMut(&Progress<'_>) -> ControlFlow<()>,
{
    let event = Progress {
        index,
        total,
        name: item.name(),
    };
    match progress(&event) {
        ControlFlow::Continue(()) => Ok(()),
        ControlFlow::Break(()) => {
            log::info!("cancelled after {index} of {total} entries");
            Err(TechArcError::Cancelled)
        }
    }
}

fn encode_file(entry: &Entry, path: &Path, options: &CreateOptions) -> Result<EncodedFile> {
    let file_name = entry.name.rsplit('/').next();
    let password = options.password.as_deref();

    let len = fs::metadata(path)?.len();
    if password.is_none() && len > options.chunk_threshold {
        let sample = read_head(path, options.auto.entropy.sample_size)?;
        let method = options
            .algorithm
            .resolve_sized(&sample, len, file_name, &options.auto, false);
        if method.is_stored() {
            log::debug!("{}: streaming {len} bytes uncompressed", entry.name);
            return Ok(EncodedFile {
                entry: entry.clone().with_method(CompressionMethod::Stored),
                payload: Payload::Streamed(path.to_path_buf()),
            });
        }
    }

    let data = fs::read(path)?;
    let crc = Crc32::compute(&data);
    let method = options
        .algorithm
        .resolve(&data, file_name, &options.auto, password.is_some());
    let (method, payload) = encode_with_fallback(&data, method, password)?;
    log::debug!(
        "{}: {} -> {} bytes ({method})",
        entry.name,
        data.len(),
        payload.len()
    );

    let mut entry = entry.clone().with_method(method).with_crc32(crc);
    entry.size = data.len() as u64;
    Ok(EncodedFile {
        entry,
        payload: Payload::Encoded(payload),
    })
}

/// Compress, falling back to raw STORED bytes when that is no larger.
///
/// Never falls back under encryption: every encrypted payload is a full
/// envelope.
fn encode_with_fallback(
    data: &[u8],
    method: CompressionMethod,
    password: Option<&str>,
) -> Result<(CompressionMethod, Vec<u8>)> {
    if password.is_none() {
        if method.is_stored() {
            return Ok((CompressionMethod::Stored, data.to_vec()));
        }
        let blob = dispatch::compress_method(data, method, None)?;
        if blob.len() >= data.len() {
            return Ok((CompressionMethod::Stored, data.to_vec()));
        }
        return Ok((method, blob));
    }
    Ok((method, dispatch::compress_method(data, method, password)?))
}

fn read_head(path: &Path, len: usize) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(len);
    File::open(path)?.take(len as u64).read_to_end(&mut head)?;
    Ok(head)
}

/// Copy a source file to `out` in chunks. Returns its length and CRC.
fn copy_source<W: Write>(path: &Path, out: &mut W) -> Result<(u64, u32)> {
    let mut reader = BufReader::with_capacity(READ_CHUNK, File::open(path)?);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut crc = Crc32::new();
    let mut len = 0u64;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        crc.update(&chunk[..n]);
        out.write_all(&chunk[..n])?;
        len += n as u64;
    }
    Ok((len, crc.finalize()))
}

fn check_recursion(source: &Path, archive: &Path) -> Result<()> {
    let source_abs = fs::canonicalize(source)?;
    let archive_abs = absolute_target(archive)?;
    if archive_abs.starts_with(&source_abs) {
        return Err(TechArcError::RecursiveArchiveRejected {
            archive: archive.to_path_buf(),
            directory: source.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet.
fn absolute_target(path: &Path) -> Result<PathBuf> {
    if let Ok(path) = fs::canonicalize(path) {
        return Ok(path);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => match fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(normalized),
        },
        _ => Ok(normalized),
    }
}

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                TechArcError::invalid_argument(format!(
                    "path is not valid UTF-8: {}",
                    path.display()
                ))
            })?),
            _ => {
                return Err(TechArcError::invalid_argument(format!(
                    "unexpected path component in {}",
                    path.display()
                )));
            }
        }
    }
    Ok(parts.join("/"))
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| {
                TechArcError::invalid_argument(format!("bad exclude pattern '{p}': {e}"))
            })
        })
        .collect()
}

fn is_excluded(patterns: &[Pattern], rel: &str) -> bool {
    let file_name = rel.rsplit('/').next().unwrap_or(rel);
    patterns
        .iter()
        .any(|p| p.matches(rel) || p.matches(file_name))
}

/// Walk `source` depth-first in file-name order, applying filters.
fn scan_source(
    source: &Path,
    options: &CreateOptions,
    base_mtimes: &HashMap<String, u64>,
) -> Result<(Vec<SourceItem>, usize)> {
    let patterns = compile_patterns(&options.exclude)?;
    let mut items = Vec::new();
    let mut skipped = 0;

    let source_meta = fs::metadata(source)?;
    if source_meta.is_file() {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TechArcError::invalid_argument("source file name is not UTF-8"))?
            .to_string();
        let mut entry = Entry::file(name, source_meta.len()).with_mtime(mtime_secs(&source_meta));
        if options.preserve_attributes {
            entry = entry.with_attributes(FileAttributes::capture(&source_meta).to_bytes()?);
        }
        items.push(SourceItem::File {
            entry,
            path: source.to_path_buf(),
        });
        return Ok((items, skipped));
    }

    let mut walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter();

    while let Some(item) = walker.next() {
        let item = item.map_err(std::io::Error::from)?;
        if item.path_is_symlink() {
            return Err(TechArcError::SymlinkRejected {
                path: item.path().to_path_buf(),
            });
        }
        let rel = relative_name(source, item.path())?;

        if is_excluded(&patterns, &rel) {
            skipped += 1;
            if item.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let meta = item.metadata().map_err(std::io::Error::from)?;
        let mtime = mtime_secs(&meta);
        let incremental_skip = base_mtimes.get(&rel).is_some_and(|&base| mtime <= base);

        if incremental_skip {
            log::debug!("unchanged since base: {rel}");
            skipped += 1;
            continue;
        }

        let mut entry = if item.file_type().is_dir() {
            Entry::directory(rel.clone())
        } else {
            let size = meta.len();
            let too_small = options.min_size.is_some_and(|min| size < min);
            let too_large = options.max_size.is_some_and(|max| size > max);
            if too_small || too_large {
                log::debug!("size filter: {rel}");
                skipped += 1;
                continue;
            }
            Entry::file(rel.clone(), size)
        };
        entry.mtime = mtime;
        if options.preserve_attributes {
            entry.attributes = Some(FileAttributes::capture(&meta).to_bytes()?);
        }

        if entry.is_dir {
            items.push(SourceItem::Directory(entry));
        } else {
            items.push(SourceItem::File {
                entry,
                path: item.path().to_path_buf(),
            });
        }
    }

    Ok((items, skipped))
}
