#![no_main]

use libfuzzer_sys::fuzz_target;
use tianocompress::{Format, compress_to_vec, decompress_to_vec, get_info};

/// Largest original length the robustness check will allocate for.
const MAX_ORIGINAL_LEN: usize = 1 << 24;

/// Verifies that the decompressor safely handles arbitrary, potentially malformed input.
///
/// # Invariant
/// The decompressor must return either `Ok(_)` or `Err(_)`. It must **never** panic,
/// regardless of the input data or the format it is read as.
fn verify_decompression_robustness(data: &[u8]) {
    // Headers may declare up to 4 GiB of output; skip those rather than allocate.
    let Ok(info) = get_info(data) else {
        return;
    };
    if info.original_len > MAX_ORIGINAL_LEN {
        return;
    }
    for format in [Format::Efi, Format::Tiano] {
        let _ = decompress_to_vec(data, format);
    }
}

/// Verifies the lossless "Round-Trip" property in both formats.
///
/// # Invariant
/// `decompress(compress(data)) == data`
///
/// # Panics
/// Panics if compression fails, if the decompressor rejects the stream, or if
/// the restored bytes differ from the input.
fn verify_round_trip(data: &[u8]) {
    for format in [Format::Efi, Format::Tiano] {
        let compressed = match compress_to_vec(data, format) {
            Ok(c) => c,
            Err(e) => panic!("Compression failed!\nError: {e:?}\nInput len: {}", data.len()),
        };

        match decompress_to_vec(&compressed, format) {
            Ok(decompressed) => {
                if decompressed != data {
                    panic!(
                        "Round-trip mismatch!\nFormat: {:?}\nInput len: {}\nCompressed len: {}\nDecompressed len: {}",
                        format,
                        data.len(),
                        compressed.len(),
                        decompressed.len()
                    );
                }
            }
            Err(e) => {
                panic!(
                    "Round-trip failed! Decompressor rejected valid compressed data.\nError: {:?}\nInput len: {}",
                    e,
                    data.len()
                );
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    // 1. Robustness: Ensure random noise doesn't crash the decompressor.
    verify_decompression_robustness(data);

    // 2. Correctness: Ensure valid data survives a compress-decompress cycle.
    verify_round_trip(data);
});
