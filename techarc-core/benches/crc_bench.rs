//! CRC-32 and bit I/O benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use techarc_core::bitstream::{BitReader, BitWriter};
use techarc_core::crc::Crc32;

mod test_data {
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed: u64 = 0x123456789ABCDEF0;
        for _ in 0..size {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((seed >> 32) as u8);
        }
        data
    }

    pub fn text_like(size: usize) -> Vec<u8> {
        let text = b"The quick brown fox jumps over the lazy dog. ";
        text.iter().copied().cycle().take(size).collect()
    }
}

fn bench_crc32_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32_sizes");

    for (size_name, size) in [
        ("16B", 16),
        ("4KB", 4 * 1024),
        ("64KB", 64 * 1024),
        ("1MB", 1024 * 1024),
    ] {
        let data = test_data::text_like(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_name), &data, |b, data| {
            b.iter(|| black_box(Crc32::compute(black_box(data))));
        });
    }

    group.finish();
}

fn bench_bitstream(c: &mut Criterion) {
    let mut group = c.benchmark_group("bitstream");
    let data = test_data::random(64 * 1024);

    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("write_7bit_codes", |b| {
        b.iter(|| {
            let mut writer = BitWriter::with_capacity(data.len());
            for &byte in &data {
                let _ = writer.write_bits(u64::from(byte), 7);
            }
            black_box(writer.finish())
        });
    });

    let (bytes, padding) = {
        let mut writer = BitWriter::new();
        for &byte in &data {
            let _ = writer.write_bits(u64::from(byte), 7);
        }
        writer.finish()
    };
    group.bench_function("read_7bit_codes", |b| {
        b.iter(|| {
            let mut reader = BitReader::new(&bytes, padding).expect("valid padding");
            let mut sum = 0u64;
            while let Ok(code) = reader.read_bits(7) {
                sum = sum.wrapping_add(code);
            }
            black_box(sum)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_crc32_sizes, bench_bitstream);
criterion_main!(benches);
