//! Lazy archive reader.

use super::header::{ArchiveHeader, read_array, read_entry, read_vec};
use crate::dispatch::{self, Algorithm};
use std::io::{Read, Seek, SeekFrom};
use techarc_core::{CompressionMethod, Crc32, Entry, Result, TechArcError};

/// Reads a TCAF archive: header and entry table eagerly, payloads on demand.
#[derive(Debug)]
pub struct TcafReader<R: Read + Seek> {
    inner: R,
    header: ArchiveHeader,
    entries: Vec<Entry>,
    payload_start: u64,
    solid: Option<Vec<u8>>,
}

impl<R: Read + Seek> TcafReader<R> {
    /// Parse the header and entry table.
    pub fn new(mut inner: R) -> Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        let header = ArchiveHeader::read(&mut inner)?;
        let mut entries = Vec::with_capacity(header.entry_count.min(65_536) as usize);
        for _ in 0..header.entry_count {
            entries.push(read_entry(&mut inner, &header)?);
        }
        let payload_start = inner.stream_position()?;

        if !header.is_solid() {
            let mut end = payload_start;
            for entry in entries.iter().filter(|e| e.is_file()) {
                if entry.offset < end {
                    return Err(TechArcError::corrupted(
                        entry.offset,
                        format!("payload of '{}' overlaps the previous entry", entry.name),
                    ));
                }
                end = entry.offset.checked_add(entry.compressed_size).ok_or_else(|| {
                    TechArcError::corrupted(entry.offset, "payload size overflows")
                })?;
            }
        }

        log::debug!(
            "TCAF v{}: {} entries, payload at {payload_start}",
            header.version,
            entries.len()
        );
        Ok(Self {
            inner,
            header,
            entries,
            payload_start,
            solid: None,
        })
    }

    /// Container header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Entry table in archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Offset of the first payload byte.
    pub fn payload_start(&self) -> u64 {
        self.payload_start
    }

    /// Raw stored payload of a per-file entry.
    pub fn read_payload(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self.entry(index)?;
        if self.header.is_solid() {
            return Err(TechArcError::invalid_argument(
                "solid archives have no per-entry payloads",
            ));
        }
        let (offset, len) = (entry.offset, entry.compressed_size);
        self.inner.seek(SeekFrom::Start(offset))?;
        let len = usize::try_from(len)
            .map_err(|_| TechArcError::corrupted(offset, "payload too large"))?;
        read_vec(&mut self.inner, len)
    }

    /// Decoded and CRC-checked contents of entry `index`.
    pub fn read_entry(&mut self, index: usize, password: Option<&str>) -> Result<Vec<u8>> {
        let entry = self.entry(index)?.clone();
        if entry.is_dir {
            return Ok(Vec::new());
        }

        let data = if self.header.is_solid() {
            let stream = self.solid_stream(password)?;
            let start = usize::try_from(entry.offset).ok();
            let end = start.and_then(|s| s.checked_add(entry.size as usize));
            match (start, end) {
                (Some(start), Some(end)) if end <= stream.len() => stream[start..end].to_vec(),
                _ => {
                    return Err(TechArcError::corrupted(
                        entry.offset,
                        format!("'{}' lies outside the solid stream", entry.name),
                    ));
                }
            }
        } else {
            let payload = self.read_payload(index)?;
            decode_payload(&payload, entry.method, self.header.is_encrypted(), password)?
        };

        if data.len() as u64 != entry.size {
            return Err(TechArcError::corrupted(
                entry.offset,
                format!(
                    "'{}' decoded to {} bytes, expected {}",
                    entry.name,
                    data.len(),
                    entry.size
                ),
            ));
        }
        if let Some(expected) = entry.crc32 {
            let computed = Crc32::compute(&data);
            if computed != expected {
                return Err(TechArcError::crc_mismatch(&entry.name, expected, computed));
            }
        }
        Ok(data)
    }

    /// Return the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn entry(&self, index: usize) -> Result<&Entry> {
        self.entries.get(index).ok_or_else(|| {
            TechArcError::invalid_argument(format!(
                "entry index {index} out of range ({} entries)",
                self.entries.len()
            ))
        })
    }

    fn solid_stream(&mut self, password: Option<&str>) -> Result<&[u8]> {
        if self.solid.is_none() {
            self.inner.seek(SeekFrom::Start(self.payload_start))?;
            let [id] = read_array(&mut self.inner)?;
            let method = CompressionMethod::from_id(id)?;
            let len = u64::from_be_bytes(read_array(&mut self.inner)?);
            let len = usize::try_from(len)
                .map_err(|_| TechArcError::corrupted(self.payload_start, "solid stream too large"))?;
            let payload = read_vec(&mut self.inner, len)?;
            let stream = decode_payload(&payload, method, self.header.is_encrypted(), password)?;
            log::debug!("solid stream: {len} -> {} bytes ({method})", stream.len());
            self.solid = Some(stream);
        }
        Ok(self.solid.as_deref().unwrap_or_default())
    }
}

/// Decode an entry or solid payload.
///
/// Unencrypted STORED payloads are raw bytes; everything else is a tagged
/// blob handled by the dispatcher.
pub fn decode_payload(
    payload: &[u8],
    method: CompressionMethod,
    encrypted: bool,
    password: Option<&str>,
) -> Result<Vec<u8>> {
    if method.is_stored() && !encrypted {
        return Ok(payload.to_vec());
    }
    dispatch::decompress(payload, Algorithm::from(method), password)
}
