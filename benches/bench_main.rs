use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tianocompress::{Format, compress_to_vec, compress_with_format, decompress_with_format};
use std::hint::black_box;

/// Deterministic high-entropy bytes (LCG, fixed seed), the worst case: every
/// block is literal-only and carries a near-flat Char&Length table.
fn generate_random(size: usize) -> Vec<u8> {
    let mut seed: u64 = 0xDEAD_BEEF;
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223) & 0xFFFF_FFFF;
            (seed >> 24) as u8
        })
        .collect()
}

/// Repeated sentences, standing in for the string tables found in drivers.
fn generate_text(size: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. ";
    text.iter().copied().cycle().take(size).collect()
}

/// Erased flash padding: one byte value, matches of maximum length throughout.
fn generate_zeroes(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

/// Benchmarks Tiano compression against various data patterns.
///
/// Scenarios:
/// 1. **Zeroes**: High repetition, long matches.
/// 2. **Random**: High entropy, literal-only blocks.
/// 3. **Text**: Moderate entropy, representative of firmware strings.
fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tiano Compression");

    // 64KB is a typical firmware file section.
    let size = 64 * 1024;

    let scenarios = [
        ("Zeroes", generate_zeroes(size)),
        ("Random", generate_random(size)),
        ("Text", generate_text(size)),
    ];

    for (name, input_data) in &scenarios {
        let bench_name = format!("{name} 64KB");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(&bench_name, |b| {
            // Pre-allocate output to avoid measuring allocation overhead during the loop.
            let mut output = vec![0u8; 2 * size];
            b.iter(|| {
                compress_with_format(black_box(input_data), black_box(&mut output), Format::Tiano).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmarks Tiano decompression.
///
/// Requires pre-compressing the source data before measuring decompression throughput.
/// Throughput is calculated based on the *uncompressed* size to represent the rate
/// of data restoration.
fn bench_decompression(c: &mut Criterion) {
    let mut group = c.benchmark_group("Tiano Decompression");
    let size = 64 * 1024;

    let scenarios = [
        ("Zeroes", generate_zeroes(size)),
        ("Random", generate_random(size)),
        ("Text", generate_text(size)),
    ];

    for (name, source_data) in &scenarios {
        // Setup: Compress the data first so we have a valid source for decompression.
        let compressed_data = compress_to_vec(source_data, Format::Tiano).unwrap();

        let bench_name = format!("{name} 64KB");

        // Throughput metrics are based on the original uncompressed size.
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(&bench_name, |b| {
            let mut output = vec![0u8; size];
            b.iter(|| {
                // A failed decompression fails the benchmark.
                decompress_with_format(black_box(&compressed_data), black_box(&mut output), Format::Tiano).unwrap();
            });
        });
    }

    group.finish();
}

/// Compares the legacy 8KB window against the Tiano window on text.
fn bench_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("Format Comparison");
    let size = 256 * 1024;
    let input = generate_text(size);

    for format in [Format::Efi, Format::Tiano] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{format:?} Text 256KB"), |b| {
            b.iter(|| compress_to_vec(black_box(&input), format).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compression, bench_decompression, bench_formats);
criterion_main!(benches);
