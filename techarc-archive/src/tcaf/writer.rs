//! Archive assembly and serialization.
//!
//! Per-file payloads either live in the builder or are spooled elsewhere
//! and copied in by [`TcafWriter::write_archive_with`].

use super::header::{ArchiveHeader, FLAG_SOLID, entry_record_len, write_entry};
use std::io::{self, Read, Write};
use techarc_core::{CompressionMethod, Entry, Result, TechArcError};

/// Solid payload prefix: `algo u8 | length u64`.
pub const SOLID_PREFIX_LEN: u64 = 9;

/// Entries and payload bytes collected before serialization.
///
/// Per-file entries get offsets relative to the payload region;
/// [`TcafWriter`] rebases them to absolute archive offsets.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    header: ArchiveHeader,
    entries: Vec<Entry>,
    data: Vec<u8>,
    payload_len: u64,
    solid: Option<(CompressionMethod, Vec<u8>)>,
}

impl ArchiveBuilder {
    /// Start an archive with `header`.
    pub fn new(header: ArchiveHeader) -> Self {
        Self {
            header,
            ..Self::default()
        }
    }

    /// The header as it will be written (entry count is filled in on write).
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Mutable access to the header.
    pub fn header_mut(&mut self) -> &mut ArchiveHeader {
        &mut self.header
    }

    /// Entries added so far.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Add a directory entry.
    pub fn add_directory(&mut self, mut entry: Entry) {
        entry.is_dir = true;
        entry.size = 0;
        entry.compressed_size = 0;
        entry.offset = 0;
        entry.method = CompressionMethod::Stored;
        entry.crc32 = None;
        self.entries.push(entry);
    }

    /// Add a per-file entry with its encoded payload.
    pub fn add_file(&mut self, entry: Entry, payload: &[u8]) {
        self.data.extend_from_slice(payload);
        self.add_spooled_file(entry, payload.len() as u64);
    }

    /// Add a per-file entry whose `len` payload bytes are held by the caller.
    ///
    /// Spooled payloads must be passed in order to
    /// [`TcafWriter::write_archive_with`].
    pub fn add_spooled_file(&mut self, mut entry: Entry, len: u64) {
        entry.offset = self.payload_len;
        entry.compressed_size = len;
        self.payload_len += len;
        self.entries.push(entry);
    }

    /// Per-file payload bytes recorded so far.
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// Add an entry whose bytes live in the solid stream at `entry.offset`.
    pub fn add_solid_member(&mut self, mut entry: Entry) {
        entry.compressed_size = 0;
        self.entries.push(entry);
    }

    /// Set the encoded solid stream and mark the archive solid.
    pub fn set_solid_payload(&mut self, method: CompressionMethod, payload: Vec<u8>) {
        self.header.set_flag(FLAG_SOLID, true);
        self.solid = Some((method, payload));
    }
}

/// Serializes an [`ArchiveBuilder`] to any sink.
#[derive(Debug)]
pub struct TcafWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> TcafWriter<W> {
    /// Wrap a sink.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write header, entry table and payloads. Returns the bytes written.
    pub fn write_archive(&mut self, builder: &ArchiveBuilder) -> Result<u64> {
        if builder.solid.is_none() && builder.data.len() as u64 != builder.payload_len {
            return Err(TechArcError::invalid_argument(
                "payloads are spooled outside the builder",
            ));
        }
        let mut data = builder.data.as_slice();
        self.write_archive_with(builder, &mut data)
    }

    /// Like [`write_archive`](Self::write_archive), copying per-file
    /// payloads from `payloads` instead of the builder.
    pub fn write_archive_with<R: Read>(
        &mut self,
        builder: &ArchiveBuilder,
        payloads: &mut R,
    ) -> Result<u64> {
        let mut header = builder.header.clone();
        header.entry_count = u32::try_from(builder.entries.len())
            .map_err(|_| TechArcError::invalid_argument("too many entries"))?;
        if header.is_solid() != builder.solid.is_some() {
            return Err(TechArcError::invalid_argument(
                "solid flag does not match the payload layout",
            ));
        }

        let mut head = Vec::new();
        header.write(&mut head)?;
        let table_len: u64 = builder
            .entries
            .iter()
            .map(|e| entry_record_len(e, header.version))
            .sum();
        let payload_start = head.len() as u64 + table_len;

        let mut table = Vec::with_capacity(table_len as usize);
        for entry in &builder.entries {
            if header.is_solid() || entry.is_dir {
                write_entry(&mut table, entry, header.version)?;
            } else {
                let mut rebased = entry.clone();
                rebased.offset += payload_start;
                write_entry(&mut table, &rebased, header.version)?;
            }
        }

        self.inner.write_all(&head)?;
        self.inner.write_all(&table)?;
        let mut total = payload_start;
        match &builder.solid {
            Some((method, payload)) => {
                self.inner.write_all(&[method.id()])?;
                self.inner.write_all(&(payload.len() as u64).to_be_bytes())?;
                self.inner.write_all(payload)?;
                total += SOLID_PREFIX_LEN + payload.len() as u64;
            }
            None => {
                let mut spooled = payloads.by_ref().take(builder.payload_len);
                let copied = io::copy(&mut spooled, &mut self.inner)?;
                if copied != builder.payload_len {
                    return Err(TechArcError::corrupted(
                        total + copied,
                        "payload spool ended early",
                    ));
                }
                total += copied;
            }
        }
        self.written += total;
        Ok(total)
    }

    /// Flush and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_rebased() {
        let mut builder = ArchiveBuilder::new(ArchiveHeader::default());
        builder.add_directory(Entry::directory("d"));
        builder.add_file(Entry::file("d/a", 3), b"AAA");
        builder.add_file(Entry::file("d/b", 2), b"BB");
        assert_eq!(builder.entries()[2].offset, 3);

        let mut writer = TcafWriter::new(Vec::new());
        let total = writer.write_archive(&builder).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(total as usize, bytes.len());
        assert_eq!(&bytes[bytes.len() - 5..], b"AAABB");
    }

    #[test]
    fn test_solid_flag_must_match() {
        let mut builder = ArchiveBuilder::new(ArchiveHeader::default());
        builder.header_mut().set_flag(FLAG_SOLID, true);
        let mut writer = TcafWriter::new(Vec::new());
        assert!(writer.write_archive(&builder).is_err());
    }

    #[test]
    fn test_spooled_payloads_copied() {
        let mut builder = ArchiveBuilder::new(ArchiveHeader::default());
        builder.add_spooled_file(Entry::file("a", 4), 4);
        builder.add_spooled_file(Entry::file("b", 3), 3);
        assert_eq!(builder.entries()[1].offset, 4);
        assert!(TcafWriter::new(Vec::new()).write_archive(&builder).is_err());

        let mut spool: &[u8] = b"AAAABBBtrailing";
        let mut writer = TcafWriter::new(Vec::new());
        writer.write_archive_with(&builder, &mut spool).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert!(bytes.ends_with(b"AAAABBB"));
        assert_eq!(spool, b"trailing");

        let mut short: &[u8] = b"AAAA";
        let err = TcafWriter::new(Vec::new())
            .write_archive_with(&builder, &mut short)
            .unwrap_err();
        assert!(err.is_corruption());
    }
}
