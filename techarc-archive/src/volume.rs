//! Multi-volume splitting.
//!
//! A logical byte stream is spread over `base.part1`, `base.part2`, ...
//! Every part starts with a 13-byte header:
//!
//! ```text
//! "TCVL" | version u8 | index u32 | total u32      (big-endian, 1-based index)
//! ```
//!
//! Each part holds at most `volume_size - 13` payload bytes. `total` is
//! written as 0 while the set is open and patched by
//! [`VolumeWriter::finish`].

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use techarc_core::format::TAG_LEN;
use techarc_core::{FormatTag, Result, TechArcError};

/// Current volume header version.
pub const VOLUME_VERSION: u8 = 1;

/// Size of the per-volume header.
pub const VOLUME_HEADER_LEN: u64 = 13;

const TOTAL_OFFSET: u64 = 9;

/// Path of part `index` (1-based) of `base`.
pub fn volume_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".part{index}"));
    PathBuf::from(name)
}

/// Split `path` into `(base, index)` when it is named `base.partN`.
pub fn parse_volume_path(path: &Path) -> Option<(PathBuf, u32)> {
    let name = path.file_name()?.to_str()?;
    let (stem, index) = name.rsplit_once(".part")?;
    if stem.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index = index.parse().ok()?;
    Some((path.with_file_name(stem), index))
}

/// Delete volumes of `base` numbered above `keep`.
///
/// Only files that start with a volume header are touched. Returns the
/// removed paths.
pub fn remove_stale_volumes(base: &Path, keep: u32) -> Result<Vec<PathBuf>> {
    let name = match base.file_name() {
        Some(name) => name.to_os_string(),
        None => return Ok(Vec::new()),
    };
    let dir = match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for item in fs::read_dir(dir)? {
        let path = item?.path();
        let Some((stem, index)) = parse_volume_path(&path) else {
            continue;
        };
        if index <= keep || stem.file_name() != Some(name.as_os_str()) || !path.is_file() {
            continue;
        }
        let mut tag = [0u8; TAG_LEN];
        let is_volume = File::open(&path)
            .and_then(|mut file| file.read_exact(&mut tag))
            .is_ok()
            && tag == *FormatTag::Volume.magic();
        if is_volume {
            fs::remove_file(&path)?;
            log::debug!("removed stale volume {}", path.display());
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

/// Header at the start of every volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    /// Format version.
    pub version: u8,
    /// 1-based position in the set.
    pub index: u32,
    /// Number of volumes in the set (0 while unfinished).
    pub total: u32,
}

impl VolumeHeader {
    /// Encode to the fixed 13-byte layout.
    pub fn to_bytes(&self) -> [u8; VOLUME_HEADER_LEN as usize] {
        let mut buf = [0u8; VOLUME_HEADER_LEN as usize];
        buf[..TAG_LEN].copy_from_slice(FormatTag::Volume.magic());
        buf[4] = self.version;
        buf[5..9].copy_from_slice(&self.index.to_be_bytes());
        buf[9..13].copy_from_slice(&self.total.to_be_bytes());
        buf
    }

    /// Decode and check magic and version.
    pub fn from_bytes(buf: &[u8; VOLUME_HEADER_LEN as usize]) -> Result<Self> {
        if FormatTag::from_magic(&buf[..TAG_LEN]) != Some(FormatTag::Volume) {
            return Err(TechArcError::unknown_format(&buf[..TAG_LEN]));
        }
        let version = buf[4];
        if version != VOLUME_VERSION {
            return Err(TechArcError::UnsupportedVersion {
                format: "TCVL",
                version,
            });
        }
        Ok(Self {
            version,
            index: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
            total: u32::from_be_bytes([buf[9], buf[10], buf[11], buf[12]]),
        })
    }

    fn read_from(path: &Path) -> Result<(Self, u64)> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < VOLUME_HEADER_LEN {
            return Err(TechArcError::corrupted(
                len,
                format!("volume {} shorter than its header", path.display()),
            ));
        }
        let mut buf = [0u8; VOLUME_HEADER_LEN as usize];
        file.read_exact(&mut buf)?;
        Ok((Self::from_bytes(&buf)?, len - VOLUME_HEADER_LEN))
    }
}

/// Writes a logical stream across size-bounded volume files.
#[derive(Debug)]
pub struct VolumeWriter {
    base: PathBuf,
    volume_size: u64,
    current: Option<BufWriter<File>>,
    used: u64,
    logical: u64,
    paths: Vec<PathBuf>,
}

impl VolumeWriter {
    /// Start a new set at `base.part1`.
    pub fn create(base: impl AsRef<Path>, volume_size: u64) -> Result<Self> {
        if volume_size <= VOLUME_HEADER_LEN {
            return Err(TechArcError::invalid_argument(format!(
                "volume size {volume_size} leaves no room after the {VOLUME_HEADER_LEN}-byte header"
            )));
        }
        let mut writer = Self {
            base: base.as_ref().to_path_buf(),
            volume_size,
            current: None,
            used: 0,
            logical: 0,
            paths: Vec::new(),
        };
        writer.open_next()?;
        Ok(writer)
    }

    /// Payload bytes each volume can hold.
    pub fn capacity(&self) -> u64 {
        self.volume_size - VOLUME_HEADER_LEN
    }

    /// Logical offset: payload bytes written so far across all volumes.
    pub fn tell(&self) -> u64 {
        self.logical
    }

    /// Number of volumes opened so far.
    pub fn volume_count(&self) -> u32 {
        self.paths.len() as u32
    }

    fn open_next(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
        }
        let index = self.paths.len() as u32 + 1;
        let path = volume_path(&self.base, index);
        let mut file = BufWriter::new(File::create(&path)?);
        let header = VolumeHeader {
            version: VOLUME_VERSION,
            index,
            total: 0,
        };
        file.write_all(&header.to_bytes())?;
        log::debug!("opened volume {}", path.display());
        self.paths.push(path);
        self.current = Some(file);
        self.used = VOLUME_HEADER_LEN;
        Ok(())
    }

    /// Close the set and write the final total into every header.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        if let Some(mut file) = self.current.take() {
            file.flush()?;
        }
        let total = self.paths.len() as u32;
        for path in &self.paths {
            let mut file = OpenOptions::new().write(true).open(path)?;
            file.seek(SeekFrom::Start(TOTAL_OFFSET))?;
            file.write_all(&total.to_be_bytes())?;
        }
        log::info!(
            "wrote {} bytes across {total} volumes of {}",
            self.logical,
            self.base.display()
        );
        Ok(self.paths)
    }
}

impl Write for VolumeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.used >= self.volume_size {
            self.open_next()?;
        }
        let room = (self.volume_size - self.used) as usize;
        let n = buf.len().min(room);
        let file = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("volume writer already finished"))?;
        file.write_all(&buf[..n])?;
        self.used += n as u64;
        self.logical += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
struct Span {
    path: PathBuf,
    start: u64,
    len: u64,
    header_len: u64,
}

/// Reads a volume set (or a plain single file) as one seekable stream.
#[derive(Debug)]
pub struct VolumeReader {
    spans: Vec<Span>,
    total_len: u64,
    pos: u64,
    /// Open span index, its file, and the file's position within the span.
    current: Option<(usize, File, u64)>,
    split: bool,
}

impl VolumeReader {
    /// Open `path`, which may be a base path, any `base.partN`, or a plain
    /// unsplit file.
    ///
    /// Every volume header is validated before any payload is read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let named_part = parse_volume_path(path);
        if named_part.is_none() && path.is_file() {
            return Self::plain(path);
        }
        let base = match named_part {
            Some((base, _)) => base,
            None => path.to_path_buf(),
        };
        let first = volume_path(&base, 1);

        if !first.exists() {
            if parse_volume_path(path).is_some() {
                return Err(TechArcError::MissingVolume {
                    index: 1,
                    path: first,
                });
            }
            return Self::plain(path);
        }

        let (head, first_len) = VolumeHeader::read_from(&first)?;
        if head.index != 1 {
            return Err(TechArcError::volume_order(format!(
                "{} claims index {}",
                first.display(),
                head.index
            )));
        }
        if head.total == 0 {
            return Err(TechArcError::volume_order("volume set was never finished"));
        }

        let mut spans = vec![Span {
            path: first,
            start: 0,
            len: first_len,
            header_len: VOLUME_HEADER_LEN,
        }];
        let mut total_len = first_len;
        for index in 2..=head.total {
            let part = volume_path(&base, index);
            if !part.exists() {
                return Err(TechArcError::MissingVolume { index, path: part });
            }
            let (header, len) = VolumeHeader::read_from(&part)?;
            if header.index != index {
                return Err(TechArcError::volume_order(format!(
                    "expected volume {index}, {} claims {}",
                    part.display(),
                    header.index
                )));
            }
            if header.total != head.total {
                return Err(TechArcError::volume_order(format!(
                    "volume {index} reports {} volumes, volume 1 reports {}",
                    header.total, head.total
                )));
            }
            spans.push(Span {
                path: part,
                start: total_len,
                len,
                header_len: VOLUME_HEADER_LEN,
            });
            total_len += len;
        }

        log::debug!(
            "opened {} volumes of {} ({total_len} bytes)",
            head.total,
            base.display()
        );
        Ok(Self {
            spans,
            total_len,
            pos: 0,
            current: None,
            split: true,
        })
    }

    fn plain(path: &Path) -> Result<Self> {
        let len = fs::metadata(path)?.len();
        Ok(Self {
            spans: vec![Span {
                path: path.to_path_buf(),
                start: 0,
                len,
                header_len: 0,
            }],
            total_len: len,
            pos: 0,
            current: None,
            split: false,
        })
    }

    /// Logical stream length.
    pub fn len(&self) -> u64 {
        self.total_len
    }

    /// True when the logical stream is empty.
    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    /// Number of physical files.
    pub fn volume_count(&self) -> usize {
        self.spans.len()
    }

    /// True when reading a `.partN` set rather than a plain file.
    pub fn is_split(&self) -> bool {
        self.split
    }

    /// Paths of the physical files in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.spans.iter().map(|span| span.path.as_path())
    }
}

impl Read for VolumeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.total_len {
            return Ok(0);
        }
        let index = self
            .spans
            .partition_point(|span| span.start + span.len <= self.pos);
        let span = &self.spans[index];
        let within = self.pos - span.start;

        let reuse = matches!(&self.current, Some((i, _, at)) if *i == index && *at == within);
        if !reuse {
            let mut file = File::open(&span.path)?;
            file.seek(SeekFrom::Start(span.header_len + within))?;
            self.current = Some((index, file, within));
        }

        let want = buf.len().min((span.len - within) as usize);
        let n = match self.current.as_mut() {
            Some((_, file, at)) => {
                let n = file.read(&mut buf[..want])?;
                *at += n as u64;
                n
            }
            None => 0,
        };
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("volume {} shrank while reading", span.path.display()),
            ));
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for VolumeReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.total_len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of stream")
        })?;
        self.pos = target;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_path_roundtrip() {
        let base = Path::new("/tmp/backup.tcaf");
        let part = volume_path(base, 12);
        assert_eq!(part, Path::new("/tmp/backup.tcaf.part12"));
        assert_eq!(parse_volume_path(&part), Some((base.to_path_buf(), 12)));
        assert_eq!(parse_volume_path(Path::new("/tmp/backup.tcaf")), None);
        assert_eq!(parse_volume_path(Path::new("/tmp/x.partial")), None);
    }

    #[test]
    fn test_header_layout() {
        let header = VolumeHeader {
            version: VOLUME_VERSION,
            index: 2,
            total: 5,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes, b"TCVL\x01\x00\x00\x00\x02\x00\x00\x00\x05");
        assert_eq!(VolumeHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_size_too_small() {
        let dir = tempfile::tempdir().unwrap();
        let err = VolumeWriter::create(dir.path().join("a"), VOLUME_HEADER_LEN).unwrap_err();
        assert!(matches!(err, TechArcError::InvalidArgument { .. }));
    }

    #[test]
    fn test_capacity_per_volume() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("a.tcaf");
        let mut writer = VolumeWriter::create(&base, 20).unwrap();
        writer.write_all(&[7u8; 15]).unwrap();
        assert_eq!(writer.tell(), 15);
        let paths = writer.finish().unwrap();
        assert_eq!(paths.len(), 3);
        for path in &paths[..2] {
            assert_eq!(fs::metadata(path).unwrap().len(), 20);
        }
        assert_eq!(fs::metadata(&paths[2]).unwrap().len(), 13 + 1);

        let mut reader = VolumeReader::open(&paths[1]).unwrap();
        assert_eq!(reader.len(), 15);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![7u8; 15]);
    }

    #[test]
    fn test_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.bin");
        fs::write(&path, b"0123456789").unwrap();
        let mut reader = VolumeReader::open(&path).unwrap();
        assert!(!reader.is_split());
        reader.seek(SeekFrom::End(-3)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "789");
    }

    #[test]
    fn test_unfinished_set_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("open.tcaf");
        let mut writer = VolumeWriter::create(&base, 64).unwrap();
        writer.write_all(b"payload").unwrap();
        writer.flush().unwrap();
        let err = VolumeReader::open(&base).unwrap_err();
        assert!(matches!(err, TechArcError::VolumeOrderMismatch { .. }));
    }

    #[test]
    fn test_plain_file_preferred_over_sibling_parts() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("both.tcaf");
        let mut writer = VolumeWriter::create(&base, 32).unwrap();
        writer.write_all(b"from the volume set").unwrap();
        writer.finish().unwrap();
        fs::write(&base, b"plain").unwrap();

        let mut out = Vec::new();
        let mut reader = VolumeReader::open(&base).unwrap();
        assert!(!reader.is_split());
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"plain");

        out.clear();
        let mut reader = VolumeReader::open(volume_path(&base, 1)).unwrap();
        assert!(reader.is_split());
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"from the volume set");
    }

    #[test]
    fn test_remove_stale_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("set.tcaf");
        let mut writer = VolumeWriter::create(&base, 16).unwrap();
        writer.write_all(&[1u8; 9]).unwrap();
        assert_eq!(writer.finish().unwrap().len(), 3);
        fs::write(volume_path(&base, 7), b"not a volume").unwrap();
        fs::write(dir.path().join("other.tcaf.part3"), VolumeHeader {
            version: VOLUME_VERSION,
            index: 3,
            total: 3,
        }
        .to_bytes())
        .unwrap();

        let removed = remove_stale_volumes(&base, 1).unwrap();
        assert_eq!(removed, vec![volume_path(&base, 2), volume_path(&base, 3)]);
        assert!(volume_path(&base, 1).exists());
        assert!(volume_path(&base, 7).exists());
        assert!(dir.path().join("other.tcaf.part3").exists());
    }
}
