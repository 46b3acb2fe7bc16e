//! Multi-volume integration tests.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use techarc_archive::dispatch::Algorithm;
use techarc_archive::volume::{VOLUME_HEADER_LEN, volume_path};
use techarc_archive::{
    CreateOptions, ExtractOptions, VolumeReader, VolumeWriter, create_archive, extract_archive,
    list_entries,
};
use techarc_core::TechArcError;
use tempfile::TempDir;

const MIB: u64 = 1024 * 1024;

fn pseudo_random(size: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 33) as u8);
    }
    data
}

fn write_volumes(base: &Path, data: &[u8], volume_size: u64) -> Vec<std::path::PathBuf> {
    let mut writer = VolumeWriter::create(base, volume_size).unwrap();
    writer.write_all(data).unwrap();
    assert_eq!(writer.tell(), data.len() as u64);
    writer.finish().unwrap()
}

#[test]
fn test_ten_megabytes_in_one_megabyte_volumes() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("big.bin");
    let data = pseudo_random(10 * MIB as usize, 3);

    let paths = write_volumes(&base, &data, MIB);
    assert_eq!(paths.len(), 11);
    for path in &paths {
        assert!(fs::metadata(path).unwrap().len() <= MIB);
    }
    assert!(!base.exists());

    let mut reader = VolumeReader::open(&base).unwrap();
    assert!(reader.is_split());
    assert_eq!(reader.volume_count(), 11);
    assert_eq!(reader.len(), data.len() as u64);
    let mut back = Vec::new();
    reader.read_to_end(&mut back).unwrap();
    assert!(back == data);
}

#[test]
fn test_open_from_any_part() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("set.bin");
    let data = pseudo_random(100_000, 11);
    let paths = write_volumes(&base, &data, 30_000);
    assert_eq!(paths.len(), 4);

    let mut reader = VolumeReader::open(&paths[2]).unwrap();
    let mut back = Vec::new();
    reader.read_to_end(&mut back).unwrap();
    assert_eq!(back, data);
}

#[test]
fn test_seek_across_boundaries() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("seek.bin");
    let data = pseudo_random(100_000, 5);
    write_volumes(&base, &data, 10_000);
    let capacity = 10_000 - VOLUME_HEADER_LEN;

    let mut reader = VolumeReader::open(&base).unwrap();
    let mut buf = [0u8; 10];
    reader.seek(SeekFrom::Start(capacity - 5)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    let start = (capacity - 5) as usize;
    assert_eq!(&buf, &data[start..start + 10]);

    reader.seek(SeekFrom::End(-10)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[data.len() - 10..]);

    reader.seek(SeekFrom::Current(-20)).unwrap();
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[data.len() - 20..data.len() - 10]);

    assert!(reader.seek(SeekFrom::Current(-200_000)).is_err());
}

#[test]
fn test_missing_second_volume() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("five.bin");
    let paths = write_volumes(&base, &pseudo_random(4_500_000, 9), MIB);
    assert_eq!(paths.len(), 5);

    fs::remove_file(volume_path(&base, 2)).unwrap();
    let err = VolumeReader::open(&base).unwrap_err();
    assert!(matches!(err, TechArcError::MissingVolume { index: 2, .. }));
}

#[test]
fn test_swapped_volumes_rejected() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("swap.bin");
    write_volumes(&base, &pseudo_random(50_000, 4), 20_000);

    let two = volume_path(&base, 2);
    let three = volume_path(&base, 3);
    let held = tmp.path().join("held");
    fs::rename(&two, &held).unwrap();
    fs::rename(&three, &two).unwrap();
    fs::rename(&held, &three).unwrap();

    let err = VolumeReader::open(&base).unwrap_err();
    assert!(matches!(err, TechArcError::VolumeOrderMismatch { .. }));
}

#[test]
fn test_split_archive_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("tree");
    fs::create_dir_all(src.join("nested")).unwrap();
    let big = pseudo_random(3 * MIB as usize, 21);
    fs::write(src.join("nested/big.bin"), &big).unwrap();
    fs::write(src.join("small.txt"), "small file\n".repeat(50)).unwrap();

    let archive = tmp.path().join("split.tcaf");
    let options = CreateOptions::default()
        .with_algorithm(Algorithm::Stored)
        .with_volume_size(MIB);
    let summary = create_archive(&src, &archive, &options).unwrap();
    assert_eq!(summary.volumes, 4);
    assert_eq!(summary.paths[0], volume_path(&archive, 1));

    let entries = list_entries(volume_path(&archive, 3)).unwrap();
    assert_eq!(entries.len(), 3);

    let out = tmp.path().join("out");
    extract_archive(&archive, &out, &ExtractOptions::default()).unwrap();
    assert!(fs::read(out.join("nested/big.bin")).unwrap() == big);

    fs::remove_file(volume_path(&archive, 2)).unwrap();
    let err = extract_archive(&archive, tmp.path().join("again"), &ExtractOptions::default())
        .unwrap_err();
    assert!(matches!(err, TechArcError::MissingVolume { index: 2, .. }));
}
