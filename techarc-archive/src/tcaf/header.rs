//! TCAF header and entry table encoding.
//!
//! All three versions are TechArc's own layouts: the header is followed
//! directly by the entry table, then the payload region. Versions differ
//! only in the fields each record carries. All integers are big-endian.
//!
//! ```text
//! header v1, v2: "TCAF" | version u8 | flags u8 | default_method u8 | entry_count u32
//! header v3:     v2 fields | created u64 | creator (u16 len + UTF-8)
//!                | comment (u32 len + UTF-8)
//!
//! entry v1: name (u16 len + UTF-8) | is_dir u8 | mtime u64 | size u64
//!           | compressed_size u64 | offset u64
//! entry v2: v1 fields | method u8
//! entry v3: v2 fields | crc32 u32 | attributes (u32 len + bytes)
//! ```
//!
//! A v1 entry has no method byte; its payload uses the header's default
//! method. Archives written by other tools under the same magic but with a
//! different layout are not readable and fail as corrupt or unsupported.

use std::io::{self, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use techarc_core::format::TAG_LEN;
use techarc_core::{CompressionMethod, Entry, FormatTag, Result, TechArcError};

/// Version written by this crate.
pub const TCAF_VERSION: u8 = 3;

/// Oldest readable version.
pub const MIN_TCAF_VERSION: u8 = 1;

/// Header flag: payload is one solid stream.
pub const FLAG_SOLID: u8 = 0x01;
/// Header flag: payloads are encrypted.
pub const FLAG_ENCRYPTED: u8 = 0x02;
/// Header flag: incremental archive.
pub const FLAG_INCREMENTAL: u8 = 0x04;
/// Header flag: entries carry attribute blobs.
pub const FLAG_ATTRIBUTES: u8 = 0x08;

/// Container-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Format version.
    pub version: u8,
    /// `FLAG_*` bits.
    pub flags: u8,
    /// Default method (used by v1 entries, which carry none).
    pub default_method: CompressionMethod,
    /// Number of entries in the table.
    pub entry_count: u32,
    /// Creation time, seconds since the Unix epoch (v3).
    pub created: u64,
    /// Creator string (v3).
    pub creator: String,
    /// Free-text comment (v3).
    pub comment: String,
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new(CompressionMethod::default())
    }
}

impl ArchiveHeader {
    /// A current-version header stamped with the current time.
    pub fn new(default_method: CompressionMethod) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: TCAF_VERSION,
            flags: 0,
            default_method,
            entry_count: 0,
            created,
            creator: String::new(),
            comment: String::new(),
        }
    }

    /// Set or clear a flag.
    pub fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Solid archive.
    pub fn is_solid(&self) -> bool {
        self.flags & FLAG_SOLID != 0
    }

    /// Encrypted payloads.
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Incremental archive.
    pub fn is_incremental(&self) -> bool {
        self.flags & FLAG_INCREMENTAL != 0
    }

    /// Entries carry attribute blobs.
    pub fn has_attributes(&self) -> bool {
        self.flags & FLAG_ATTRIBUTES != 0
    }

    /// Serialize using the layout of `self.version`.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        check_version(self.version)?;
        writer.write_all(FormatTag::Archive.magic())?;
        writer.write_all(&[self.version, self.flags, self.default_method.id()])?;
        writer.write_all(&self.entry_count.to_be_bytes())?;
        if self.version >= 3 {
            writer.write_all(&self.created.to_be_bytes())?;
            write_str_u16(writer, &self.creator)?;
            let comment = self.comment.as_bytes();
            let len = u32::try_from(comment.len())
                .map_err(|_| TechArcError::invalid_argument("archive comment too long"))?;
            writer.write_all(&len.to_be_bytes())?;
            writer.write_all(comment)?;
        }
        Ok(())
    }

    /// Parse a header. The version byte directly follows the magic.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic: [u8; TAG_LEN] = read_array(reader)?;
        if FormatTag::from_magic(&magic) != Some(FormatTag::Archive) {
            return Err(TechArcError::unknown_format(magic.as_slice()));
        }
        let [version] = read_array(reader)?;
        check_version(version)?;
        let [flags, method] = read_array(reader)?;
        let default_method = CompressionMethod::from_id(method)?;
        let entry_count = u32::from_be_bytes(read_array(reader)?);

        let mut header = Self {
            version,
            flags,
            default_method,
            entry_count,
            created: 0,
            creator: String::new(),
            comment: String::new(),
        };
        if version >= 3 {
            header.created = u64::from_be_bytes(read_array(reader)?);
            header.creator = read_str_u16(reader)?;
            let len = u32::from_be_bytes(read_array(reader)?);
            header.comment = read_string(reader, len as usize)?;
        }
        Ok(header)
    }
}

fn check_version(version: u8) -> Result<()> {
    if (MIN_TCAF_VERSION..=TCAF_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(TechArcError::UnsupportedVersion {
            format: "TCAF",
            version,
        })
    }
}

/// Write one entry record in the layout of `version`.
pub fn write_entry<W: Write>(writer: &mut W, entry: &Entry, version: u8) -> Result<()> {
    write_str_u16(writer, &entry.name)?;
    writer.write_all(&[u8::from(entry.is_dir)])?;
    writer.write_all(&entry.mtime.to_be_bytes())?;
    writer.write_all(&entry.size.to_be_bytes())?;
    writer.write_all(&entry.compressed_size.to_be_bytes())?;
    writer.write_all(&entry.offset.to_be_bytes())?;
    if version >= 2 {
        writer.write_all(&[entry.method.id()])?;
    }
    if version >= 3 {
        writer.write_all(&entry.crc32.unwrap_or(0).to_be_bytes())?;
        let attrs = entry.attributes.as_deref().unwrap_or_default();
        let len = u32::try_from(attrs.len())
            .map_err(|_| TechArcError::invalid_argument("attribute blob too long"))?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(attrs)?;
    }
    Ok(())
}

/// Encoded size of an entry record in the layout of `version`.
pub fn entry_record_len(entry: &Entry, version: u8) -> u64 {
    let mut len = 2 + entry.name.len() as u64 + 1 + 8 * 4;
    if version >= 2 {
        len += 1;
    }
    if version >= 3 {
        len += 4 + 4 + entry.attributes.as_ref().map_or(0, |a| a.len() as u64);
    }
    len
}

/// Read one entry record in the layout of `header.version`.
pub fn read_entry<R: Read>(reader: &mut R, header: &ArchiveHeader) -> Result<Entry> {
    let name = read_str_u16(reader)?;
    let [is_dir] = read_array(reader)?;
    let mtime = u64::from_be_bytes(read_array(reader)?);
    let size = u64::from_be_bytes(read_array(reader)?);
    let compressed_size = u64::from_be_bytes(read_array(reader)?);
    let offset = u64::from_be_bytes(read_array(reader)?);
    let is_dir = match is_dir {
        0 => false,
        1 => true,
        other => {
            return Err(TechArcError::corrupted(
                0,
                format!("entry '{name}' has directory flag {other}"),
            ));
        }
    };

    let method = if header.version >= 2 {
        let [id] = read_array(reader)?;
        CompressionMethod::from_id(id)?
    } else if is_dir {
        CompressionMethod::Stored
    } else {
        header.default_method
    };

    let mut crc32 = None;
    let mut attributes = None;
    if header.version >= 3 {
        let crc = u32::from_be_bytes(read_array(reader)?);
        if !is_dir {
            crc32 = Some(crc);
        }
        let len = u32::from_be_bytes(read_array(reader)?) as usize;
        if len > 0 {
            attributes = Some(read_vec(reader, len)?);
        }
    }

    Ok(Entry {
        name,
        is_dir,
        mtime,
        size,
        compressed_size,
        offset,
        method,
        crc32,
        attributes,
    })
}

fn eof_as_corrupt(err: io::Error) -> TechArcError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TechArcError::corrupted(0, "archive header or entry table is truncated")
    } else {
        TechArcError::Io(err)
    }
}

pub(crate) fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(eof_as_corrupt)?;
    Ok(buf)
}

pub(crate) fn read_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let read = reader
        .take(len as u64)
        .read_to_end(&mut buf)
        .map_err(eof_as_corrupt)?;
    if read != len {
        return Err(eof_as_corrupt(io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(buf)
}

fn read_string<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    String::from_utf8(read_vec(reader, len)?)
        .map_err(|_| TechArcError::corrupted(0, "string is not valid UTF-8"))
}

fn read_str_u16<R: Read>(reader: &mut R) -> Result<String> {
    let len = u16::from_be_bytes(read_array(reader)?);
    read_string(reader, len as usize)
}

fn write_str_u16<W: Write>(writer: &mut W, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| TechArcError::invalid_argument(format!("name too long: {} bytes", s.len())))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}
