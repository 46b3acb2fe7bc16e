//! Recovery record integration tests.

use std::fs;
use std::io::Read;
use std::path::Path;
use techarc_archive::dispatch::Algorithm;
use techarc_archive::recovery::{self, DEFAULT_BLOCK_SIZE};
use techarc_archive::volume::volume_path;
use techarc_archive::{
    CreateOptions, ExtractOptions, VolumeReader, create_archive, extract_archive, repair_archive,
    verify_archive,
};
use techarc_core::TechArcError;
use tempfile::TempDir;

fn pseudo_random(size: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 33) as u8);
    }
    data
}

/// A stored archive of one 300 KB file with a 10% recovery record.
fn protected_archive(dir: &Path) -> (std::path::PathBuf, Vec<u8>) {
    let src = dir.join("tree");
    fs::create_dir_all(&src).unwrap();
    let payload = pseudo_random(300_000, 17);
    fs::write(src.join("payload.bin"), &payload).unwrap();

    let archive = dir.join("protected.tcaf");
    let options = CreateOptions::default()
        .with_algorithm(Algorithm::Stored)
        .with_recovery_percent(10);
    create_archive(&src, &archive, &options).unwrap();
    (archive, payload)
}

fn corrupt(path: &Path, offsets: &[usize]) {
    let mut bytes = fs::read(path).unwrap();
    for &offset in offsets {
        bytes[offset] ^= 0x5A;
    }
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_archive_footer_present() {
    let tmp = TempDir::new().unwrap();
    let (archive, _) = protected_archive(tmp.path());
    let bytes = fs::read(&archive).unwrap();
    assert!(bytes.ends_with(b"TCRR"));

    let (body, footer) = recovery::split_footer(&bytes).unwrap().unwrap();
    let info = footer.info();
    assert_eq!(info.block_count, body.len().div_ceil(DEFAULT_BLOCK_SIZE));
    assert_eq!(info.group_size, 10);
    assert_eq!(info.parity_count, 1);

    // The footer does not disturb normal reading.
    assert_eq!(verify_archive(&archive, None).unwrap().files, 1);
}

#[test]
fn test_single_damaged_block_repaired() {
    let tmp = TempDir::new().unwrap();
    let (archive, payload) = protected_archive(tmp.path());
    corrupt(&archive, &[100_000]);
    assert!(verify_archive(&archive, None).unwrap_err().is_corruption());

    let fixed = tmp.path().join("fixed.tcaf");
    let summary = repair_archive(&archive, &fixed).unwrap();
    assert_eq!(summary.repaired_blocks, vec![1]);

    let out = tmp.path().join("out");
    extract_archive(&fixed, &out, &ExtractOptions::default()).unwrap();
    assert!(fs::read(out.join("payload.bin")).unwrap() == payload);

    // The repaired archive carries its footer forward.
    let again = repair_archive(&fixed, tmp.path().join("again.tcaf")).unwrap();
    assert!(again.repaired_blocks.is_empty());
}

#[test]
fn test_two_blocks_in_one_group_unrecoverable() {
    let tmp = TempDir::new().unwrap();
    let (archive, _) = protected_archive(tmp.path());
    corrupt(&archive, &[70_000, 140_000]);

    let err = repair_archive(&archive, tmp.path().join("fixed.tcaf")).unwrap_err();
    assert!(matches!(err, TechArcError::Unrecoverable { group: 0 }));
}

#[test]
fn test_one_block_per_group_repaired() {
    let body = pseudo_random(1000, 2);
    let footer = recovery::generate_with_block_size(&body, 50, 100).unwrap();
    assert_eq!(footer.info().group_size, 2);
    assert_eq!(footer.info().parity_count, 5);

    let mut damaged = body.clone();
    damaged[5] ^= 1;
    damaged[250] ^= 1;
    damaged[999] ^= 1;
    let report = recovery::repair(&damaged, &footer).unwrap();
    assert_eq!(report.repaired_blocks, vec![0, 2, 9]);
    assert_eq!(report.data, body);
    assert_eq!(recovery::apply(&damaged, &footer).unwrap(), body);
}

#[test]
fn test_recovery_record_spans_volumes() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("tree");
    fs::create_dir_all(&src).unwrap();
    let payload = pseudo_random(300_000, 23);
    fs::write(src.join("payload.bin"), &payload).unwrap();

    let archive = tmp.path().join("split.tcaf");
    let options = CreateOptions::default()
        .with_algorithm(Algorithm::Stored)
        .with_recovery_percent(10)
        .with_volume_size(128 * 1024);
    let summary = create_archive(&src, &archive, &options).unwrap();
    assert_eq!(summary.volumes, 3);
    let last = fs::read(volume_path(&archive, 3)).unwrap();
    assert!(last.ends_with(b"TCRR"));

    // The footer covers the logical stream, not the physical parts.
    let mut logical = Vec::new();
    VolumeReader::open(&archive)
        .unwrap()
        .read_to_end(&mut logical)
        .unwrap();
    assert_eq!(logical.len() as u64, summary.archive_size);
    let (body, footer) = recovery::split_footer(&logical).unwrap().unwrap();
    assert_eq!(footer, recovery::generate(body, 10).unwrap());

    corrupt(&volume_path(&archive, 2), &[1000]);
    assert!(verify_archive(&archive, None).unwrap_err().is_corruption());
    let fixed = tmp.path().join("fixed.tcaf");
    let repaired = repair_archive(&archive, &fixed).unwrap();
    assert_eq!(repaired.repaired_blocks, vec![2]);

    let out = tmp.path().join("out");
    extract_archive(&fixed, &out, &ExtractOptions::default()).unwrap();
    assert!(fs::read(out.join("payload.bin")).unwrap() == payload);
}
