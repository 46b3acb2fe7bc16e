//! XOR-parity recovery records.
//!
//! The archive body is cut into fixed-size blocks (64 KiB by default) and
//! consecutive blocks are grouped so that one parity block per group costs
//! roughly the requested percentage of the body. Each block's CRC-32 locates
//! damage; one damaged block per group can be rebuilt from the parity and
//! the group's other blocks. Anything more is reported, never guessed.
//!
//! ## Footer layout
//!
//! ```text
//! "TCRR" | version u8 | percent u8 | block_size u32 | body_len u64
//!        | group_size u32 | block_count u32 | block_crc u32 * block_count
//!        | parity_count u32 | (parity_crc u32 | parity block) * parity_count
//! trailer: footer_len u64 | "TCRR"
//! ```

use std::io::{self, Write};
use techarc_core::format::TAG_LEN;
use techarc_core::{Crc32, FormatTag, Result, TechArcError};

/// Footer format version.
pub const RECOVERY_VERSION: u8 = 1;

/// Default block size.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Length of the trailer that locates the footer.
pub const TRAILER_LEN: usize = 8 + TAG_LEN;

/// Parity data appended after an archive body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFooter {
    /// Requested redundancy in percent of the body.
    pub percent: u8,
    /// Block size in bytes.
    pub block_size: u32,
    /// Length of the protected body.
    pub body_len: u64,
    /// Blocks per parity group.
    pub group_size: u32,
    /// CRC-32 of each body block (the last block unpadded).
    pub block_crcs: Vec<u32>,
    /// One XOR parity block per group.
    pub parity: Vec<Vec<u8>>,
    /// CRC-32 of each parity block.
    pub parity_crcs: Vec<u32>,
}

/// Summary of what a footer can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryInfo {
    /// Number of body blocks.
    pub block_count: usize,
    /// Number of parity blocks (and groups).
    pub parity_count: usize,
    /// Blocks per group.
    pub group_size: usize,
    /// Block size in bytes.
    pub block_size: usize,
    /// Most blocks that can be repaired, one per group.
    pub max_repairable: usize,
    /// Parity overhead in bytes.
    pub parity_bytes: u64,
}

/// Outcome of [`repair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// The body, repaired where needed.
    pub data: Vec<u8>,
    /// Indices of the blocks that were rebuilt.
    pub repaired_blocks: Vec<usize>,
}

/// [`generate_with_block_size`] with 64 KiB blocks.
pub fn generate(body: &[u8], percent: u8) -> Result<RecoveryFooter> {
    generate_with_block_size(body, percent, DEFAULT_BLOCK_SIZE)
}

/// Build parity for `body`.
///
/// `percent` must be 1-100; each group holds `ceil(100 / percent)` blocks.
pub fn generate_with_block_size(
    body: &[u8],
    percent: u8,
    block_size: usize,
) -> Result<RecoveryFooter> {
    let mut encoder = RecoveryEncoder::with_block_size(percent, block_size)?;
    encoder.update(body);
    Ok(encoder.finish())
}

/// Builds a footer incrementally as the body is produced.
///
/// Holds one partial block and one parity block per group, so an archive
/// can be protected while it streams to disk.
#[derive(Debug, Clone)]
pub struct RecoveryEncoder {
    percent: u8,
    block_size: usize,
    group_size: usize,
    block: Vec<u8>,
    group_parity: Vec<u8>,
    blocks_in_group: usize,
    block_crcs: Vec<u32>,
    parity: Vec<Vec<u8>>,
    body_len: u64,
}

impl RecoveryEncoder {
    /// Encoder with 64 KiB blocks.
    pub fn new(percent: u8) -> Result<Self> {
        Self::with_block_size(percent, DEFAULT_BLOCK_SIZE)
    }

    /// Encoder with an explicit block size.
    pub fn with_block_size(percent: u8, block_size: usize) -> Result<Self> {
        if !(1..=100).contains(&percent) {
            return Err(TechArcError::invalid_argument(format!(
                "recovery percent {percent} outside 1-100"
            )));
        }
        if block_size == 0 || block_size > u32::MAX as usize {
            return Err(TechArcError::invalid_argument(format!(
                "invalid recovery block size {block_size}"
            )));
        }
        Ok(Self {
            percent,
            block_size,
            group_size: 100usize.div_ceil(usize::from(percent)),
            block: Vec::with_capacity(block_size),
            group_parity: vec![0u8; block_size],
            blocks_in_group: 0,
            block_crcs: Vec::new(),
            parity: Vec::new(),
            body_len: 0,
        })
    }

    /// Body bytes seen so far.
    pub fn body_len(&self) -> u64 {
        self.body_len
    }

    /// Feed the next body bytes.
    pub fn update(&mut self, mut data: &[u8]) {
        self.body_len += data.len() as u64;
        while !data.is_empty() {
            let take = (self.block_size - self.block.len()).min(data.len());
            self.block.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.block.len() == self.block_size {
                self.close_block();
            }
        }
    }

    fn close_block(&mut self) {
        self.block_crcs.push(Crc32::compute(&self.block));
        xor_into(&mut self.group_parity, &self.block);
        self.block.clear();
        self.blocks_in_group += 1;
        if self.blocks_in_group == self.group_size {
            self.close_group();
        }
    }

    fn close_group(&mut self) {
        let parity = std::mem::replace(&mut self.group_parity, vec![0u8; self.block_size]);
        self.parity.push(parity);
        self.blocks_in_group = 0;
    }

    /// Close the last partial block and group.
    pub fn finish(mut self) -> RecoveryFooter {
        if !self.block.is_empty() {
            self.close_block();
        }
        if self.blocks_in_group > 0 {
            self.close_group();
        }
        let parity_crcs = self.parity.iter().map(|p| Crc32::compute(p)).collect();
        log::debug!(
            "recovery: {} blocks, {} parity blocks, {}%",
            self.block_crcs.len(),
            self.parity.len(),
            self.percent
        );
        RecoveryFooter {
            percent: self.percent,
            block_size: self.block_size as u32,
            body_len: self.body_len,
            group_size: self.group_size as u32,
            block_crcs: self.block_crcs,
            parity: self.parity,
            parity_crcs,
        }
    }
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Repair `data` using `footer`, returning the repaired body.
pub fn apply(data: &[u8], footer: &RecoveryFooter) -> Result<Vec<u8>> {
    repair(data, footer).map(|report| report.data)
}

/// Repair `data` and report which blocks were rebuilt.
///
/// A group with one bad block is rebuilt and re-verified; a group with more
/// than one, or with a bad block and a bad parity block, fails with
/// `Unrecoverable`.
pub fn repair(data: &[u8], footer: &RecoveryFooter) -> Result<RepairReport> {
    if data.len() as u64 != footer.body_len {
        return Err(TechArcError::corrupted(
            data.len() as u64,
            format!(
                "body is {} bytes, recovery record covers {}",
                data.len(),
                footer.body_len
            ),
        ));
    }

    let block_size = footer.block_size as usize;
    let group_size = footer.group_size as usize;
    let mut out = data.to_vec();
    let mut repaired_blocks = Vec::new();

    let bad: Vec<usize> = data
        .chunks(block_size)
        .zip(&footer.block_crcs)
        .enumerate()
        .filter(|(_, (chunk, crc))| Crc32::compute(chunk) != **crc)
        .map(|(index, _)| index)
        .collect();

    for members in bad.chunk_by(|a, b| a / group_size == b / group_size) {
        let group = members[0] / group_size;
        if members.len() > 1 {
            log::warn!("recovery group {group}: {} damaged blocks", members.len());
            return Err(TechArcError::Unrecoverable { group });
        }
        let parity = match (footer.parity.get(group), footer.parity_crcs.get(group)) {
            (Some(parity), Some(&crc)) if Crc32::compute(parity) == crc => parity,
            _ => return Err(TechArcError::Unrecoverable { group }),
        };

        let target = members[0];
        let mut rebuilt = parity.clone();
        let first = group * group_size;
        let last = (first + group_size).min(footer.block_crcs.len());
        for index in (first..last).filter(|&i| i != target) {
            let start = index * block_size;
            let end = (start + block_size).min(data.len());
            xor_into(&mut rebuilt, &data[start..end]);
        }

        let start = target * block_size;
        let end = (start + block_size).min(data.len());
        rebuilt.truncate(end - start);
        if Crc32::compute(&rebuilt) != footer.block_crcs[target] {
            return Err(TechArcError::Unrecoverable { group });
        }
        out[start..end].copy_from_slice(&rebuilt);
        log::info!("repaired block {target} in recovery group {group}");
        repaired_blocks.push(target);
    }

    Ok(RepairReport {
        data: out,
        repaired_blocks,
    })
}

/// Separate a body from its appended footer, if there is one.
pub fn split_footer(data: &[u8]) -> Result<Option<(&[u8], RecoveryFooter)>> {
    if data.len() < TRAILER_LEN || !data.ends_with(FormatTag::Recovery.magic()) {
        return Ok(None);
    }
    let len_at = data.len() - TRAILER_LEN;
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&data[len_at..len_at + 8]);
    let footer_len = u64::from_be_bytes(len_bytes);

    let footer_start = usize::try_from(footer_len)
        .ok()
        .and_then(|len| len_at.checked_sub(len))
        .ok_or_else(|| {
            TechArcError::corrupted(len_at as u64, "recovery footer length out of range")
        })?;
    let footer = RecoveryFooter::from_bytes(&data[footer_start..len_at])?;
    let body = &data[..footer_start];
    if body.len() as u64 != footer.body_len {
        return Err(TechArcError::corrupted(
            footer_start as u64,
            "recovery footer does not match body length",
        ));
    }
    Ok(Some((body, footer)))
}

impl RecoveryFooter {
    /// Block, group and overhead figures.
    pub fn info(&self) -> RecoveryInfo {
        RecoveryInfo {
            block_count: self.block_crcs.len(),
            parity_count: self.parity.len(),
            group_size: self.group_size as usize,
            block_size: self.block_size as usize,
            max_repairable: self.parity.len(),
            parity_bytes: self.parity.len() as u64 * u64::from(self.block_size),
        }
    }

    /// Serialize the footer (without trailer).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            26 + self.block_crcs.len() * 4 + self.parity.len() * (4 + self.block_size as usize),
        );
        out.extend_from_slice(FormatTag::Recovery.magic());
        out.push(RECOVERY_VERSION);
        out.push(self.percent);
        out.extend_from_slice(&self.block_size.to_be_bytes());
        out.extend_from_slice(&self.body_len.to_be_bytes());
        out.extend_from_slice(&self.group_size.to_be_bytes());
        out.extend_from_slice(&(self.block_crcs.len() as u32).to_be_bytes());
        for crc in &self.block_crcs {
            out.extend_from_slice(&crc.to_be_bytes());
        }
        out.extend_from_slice(&(self.parity.len() as u32).to_be_bytes());
        for (block, crc) in self.parity.iter().zip(&self.parity_crcs) {
            out.extend_from_slice(&crc.to_be_bytes());
            out.extend_from_slice(block);
        }
        out
    }

    /// Append footer and trailer to an archive body.
    pub fn append_to(&self, body: &mut Vec<u8>) {
        let footer = self.to_bytes();
        body.extend_from_slice(&footer);
        body.extend_from_slice(&(footer.len() as u64).to_be_bytes());
        body.extend_from_slice(FormatTag::Recovery.magic());
    }

    /// Write footer and trailer after a body already written to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let footer = self.to_bytes();
        writer.write_all(&footer)?;
        writer.write_all(&(footer.len() as u64).to_be_bytes())?;
        writer.write_all(FormatTag::Recovery.magic())
    }

    /// Parse a footer produced by [`RecoveryFooter::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = FooterCursor { bytes, pos: 0 };
        if cursor.take(TAG_LEN)? != FormatTag::Recovery.magic() {
            return Err(TechArcError::unknown_format(&bytes[..TAG_LEN]));
        }
        let version = cursor.u8()?;
        if version != RECOVERY_VERSION {
            return Err(TechArcError::UnsupportedVersion {
                format: "TCRR",
                version,
            });
        }
        let percent = cursor.u8()?;
        let block_size = cursor.u32()?;
        let body_len = cursor.u64()?;
        let group_size = cursor.u32()?;
        if block_size == 0 || group_size == 0 {
            return Err(TechArcError::corrupted(0, "zero block or group size"));
        }

        let block_count = cursor.u32()? as usize;
        let expected_blocks = body_len.div_ceil(u64::from(block_size));
        if block_count as u64 != expected_blocks {
            return Err(TechArcError::corrupted(
                cursor.pos as u64,
                format!("{block_count} block checksums for {expected_blocks} blocks"),
            ));
        }
        let block_crcs = (0..block_count)
            .map(|_| cursor.u32())
            .collect::<Result<Vec<_>>>()?;

        let parity_count = cursor.u32()? as usize;
        if parity_count != block_count.div_ceil(group_size as usize) {
            return Err(TechArcError::corrupted(
                cursor.pos as u64,
                format!("{parity_count} parity blocks for {block_count} blocks"),
            ));
        }
        let mut parity = Vec::with_capacity(parity_count);
        let mut parity_crcs = Vec::with_capacity(parity_count);
        for _ in 0..parity_count {
            parity_crcs.push(cursor.u32()?);
            parity.push(cursor.take(block_size as usize)?.to_vec());
        }
        if cursor.pos != bytes.len() {
            return Err(TechArcError::corrupted(
                cursor.pos as u64,
                "trailing bytes in recovery footer",
            ));
        }

        Ok(Self {
            percent,
            block_size,
            body_len,
            group_size,
            block_crcs,
            parity,
            parity_crcs,
        })
    }
}

struct FooterCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FooterCursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| TechArcError::corrupted(self.pos as u64, "truncated recovery footer"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(len: usize) -> Vec<u8> {
        let mut seed = 42u64;
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
                (seed >> 33) as u8
            })
            .collect()
    }

    #[test]
    fn test_group_sizing() {
        let footer = generate_with_block_size(&body(1000), 10, 64).unwrap();
        let info = footer.info();
        assert_eq!(info.block_count, 16);
        assert_eq!(info.group_size, 10);
        assert_eq!(info.parity_count, 2);

        let full = generate_with_block_size(&body(1000), 100, 64).unwrap();
        assert_eq!(full.info().parity_count, 16);

        let odd = generate_with_block_size(&body(1000), 30, 64).unwrap();
        assert_eq!(odd.group_size, 4);
    }

    #[test]
    fn test_percent_bounds() {
        assert!(generate(b"x", 0).is_err());
        assert!(generate(b"x", 101).is_err());
    }

    #[test]
    fn test_clean_body_unchanged() {
        let data = body(5000);
        let footer = generate_with_block_size(&data, 20, 256).unwrap();
        let report = repair(&data, &footer).unwrap();
        assert_eq!(report.data, data);
        assert!(report.repaired_blocks.is_empty());
    }

    #[test]
    fn test_repairs_short_last_block() {
        let data = body(1000);
        let footer = generate_with_block_size(&data, 50, 128).unwrap();
        let mut damaged = data.clone();
        damaged[990] ^= 0xFF;
        let report = repair(&damaged, &footer).unwrap();
        assert_eq!(report.repaired_blocks, vec![7]);
        assert_eq!(report.data, data);
    }

    #[test]
    fn test_bad_parity_with_bad_block() {
        let data = body(1000);
        let mut footer = generate_with_block_size(&data, 50, 128).unwrap();
        footer.parity[0][0] ^= 1;
        let mut damaged = data.clone();
        damaged[0] ^= 1;
        assert!(matches!(
            repair(&damaged, &footer),
            Err(TechArcError::Unrecoverable { group: 0 })
        ));
    }

    #[test]
    fn test_footer_bytes_roundtrip() {
        let data = body(3000);
        let footer = generate_with_block_size(&data, 25, 512).unwrap();
        let mut archive = data.clone();
        footer.append_to(&mut archive);

        let (found_body, parsed) = split_footer(&archive).unwrap().unwrap();
        assert_eq!(found_body, data.as_slice());
        assert_eq!(parsed, footer);
        assert!(split_footer(&data).unwrap().is_none());
    }

    #[test]
    fn test_truncated_footer() {
        let footer = generate_with_block_size(&body(300), 50, 64).unwrap();
        let bytes = footer.to_bytes();
        assert!(RecoveryFooter::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_encoder_matches_uneven_writes() {
        let data = body(7000);
        let whole = generate_with_block_size(&data, 30, 256).unwrap();

        let mut encoder = RecoveryEncoder::with_block_size(30, 256).unwrap();
        for piece in data.chunks(97) {
            encoder.update(piece);
        }
        assert_eq!(encoder.body_len(), 7000);
        assert_eq!(encoder.finish(), whole);

        let mut appended = Vec::new();
        whole.append_to(&mut appended);
        let mut written = Vec::new();
        whole.write_to(&mut written).unwrap();
        assert_eq!(written, appended);
    }
}
