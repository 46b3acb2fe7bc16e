//! Edge case tests for LZ77 + Huffman compression.

use techarc_core::TechArcError;
use techarc_deflate::{Lz77Config, compress, compress_with_config, decompress};

fn pseudo_random(size: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    for _ in 0..size {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        data.push((seed >> 33) as u8);
    }
    data
}

#[test]
fn test_empty_input() {
    let compressed = compress(b"").unwrap();
    assert_eq!(decompress(&compressed).unwrap(), b"");
}

#[test]
fn test_single_byte() {
    let compressed = compress(b"A").unwrap();
    assert_eq!(decompress(&compressed).unwrap(), b"A");
}

#[test]
fn test_all_zeros() {
    let input = vec![0u8; 1000];
    let compressed = compress(&input).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), input);
    assert!(compressed.len() < input.len() / 10);
}

#[test]
fn test_all_same_byte() {
    let input = vec![255u8; 5000];
    let compressed = compress(&input).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), input);
    assert!(compressed.len() < input.len() / 20);
}

#[test]
fn test_max_match_length() {
    let input = vec![42u8; 258 * 10];
    let compressed = compress_with_config(&input, Lz77Config::BEST).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), input);
}

#[test]
fn test_random_data() {
    let input = pseudo_random(100_000, 17);
    let compressed = compress(&input).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), input);
}

#[test]
fn test_every_config() {
    let input: Vec<u8> = b"the rain in spain stays mainly in the plain. "
        .iter()
        .copied()
        .cycle()
        .take(40_000)
        .collect();
    for config in [Lz77Config::FAST, Lz77Config::DEFAULT, Lz77Config::BEST] {
        let compressed = compress_with_config(&input, config).unwrap();
        assert!(compressed.len() < input.len() / 20);
        assert_eq!(decompress(&compressed).unwrap(), input);
    }
}

#[test]
fn test_matches_beyond_window() {
    // Repeats spaced wider than 32 KiB cannot be referenced.
    let block = pseudo_random(40_000, 3);
    let mut input = block.clone();
    input.extend_from_slice(&block);
    let compressed = compress(&input).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), input);
}

#[test]
fn test_large_text_roundtrip() {
    let words = ["alpha ", "beta ", "gamma ", "delta ", "epsilon\n"];
    let mut input = Vec::with_capacity(1_200_000);
    let mut seed = 11u64;
    while input.len() < 1_100_000 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        input.extend_from_slice(words[(seed >> 60) as usize % words.len()].as_bytes());
    }
    let compressed = compress(&input).unwrap();
    assert!(compressed.len() < input.len() / 3);
    assert_eq!(decompress(&compressed).unwrap(), input);
}

#[test]
fn test_truncated_stream_rejected() {
    let compressed = compress(b"Hello, World! Hello, World! Hello!").unwrap();
    let cut = &compressed[..compressed.len() - 2];
    assert!(decompress(cut).is_err());
}

#[test]
fn test_missing_tree_rejected() {
    // Padding byte followed by a zero presence bit for the litlen tree.
    let err = decompress(&[7, 0x00]).unwrap_err();
    assert!(matches!(err, TechArcError::CorruptData { .. }));
}

#[test]
fn test_trailing_data_rejected() {
    let mut compressed = compress(b"some text").unwrap();
    compressed.extend_from_slice(&[0xAB, 0xCD]);
    assert!(decompress(&compressed).is_err());
}
