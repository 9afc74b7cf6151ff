use tianocompress::{
    Corruption, Error, Format, HEADER_LEN, compress, compress_to_vec, compress_with_format,
    decompress, decompress_to_vec, decompress_with_format, get_info,
};

// --- Helpers ---

/// Compresses with `format`, decompresses through the slice API, and asserts
/// bit-exact reconstruction.
#[track_caller]
fn assert_round_trip_with(input: &[u8], format: Format) {
    let compressed = match compress_to_vec(input, format) {
        Ok(c) => c,
        Err(e) => panic!("Compression failed during round-trip: {e:?}"),
    };

    let mut output = vec![0u8; input.len()];
    match decompress_with_format(&compressed, &mut output, format) {
        Ok(()) => assert_eq!(output, input, "Round-trip output mismatches input"),
        Err(e) => panic!("Decompression failed during round-trip: {e:?}"),
    }
}

/// Round-trips through both formats.
#[track_caller]
fn assert_round_trip(input: &[u8]) {
    assert_round_trip_with(input, Format::Tiano);
    assert_round_trip_with(input, Format::Efi);
}

/// Deterministic high-entropy bytes.
fn generate_random(size: usize, mut seed: u64) -> Vec<u8> {
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            (seed >> 56) as u8
        })
        .collect()
}

fn generate_text(size: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs! ";
    text.iter().copied().cycle().take(size).collect()
}

fn header_fields(stream: &[u8]) -> (usize, usize) {
    let compressed = u32::from_le_bytes(stream[0..4].try_into().unwrap()) as usize;
    let original = u32::from_le_bytes(stream[4..8].try_into().unwrap()) as usize;
    (compressed, original)
}

/// MSB-first bit cursor over a stream payload.
struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl BitCursor<'_> {
    fn get(&mut self, n: usize) -> u32 {
        let mut value = 0;
        for _ in 0..n {
            let byte = self.data.get(self.pos / 8).copied().unwrap_or(0);
            value = (value << 1) | u32::from((byte >> (7 - self.pos % 8)) & 1);
            self.pos += 1;
        }
        value
    }
}

/// MSB-first bit packer for hand-built streams.
#[derive(Default)]
struct BitPacker {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitPacker {
    fn put(&mut self, n: usize, value: u32) {
        for i in (0..n).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 != 0 {
                *self.bytes.last_mut().unwrap() |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
    }

    /// Wraps the packed bits in a stream header and terminator.
    fn into_stream(mut self, original_len: u32) -> Vec<u8> {
        self.bytes.push(0);
        let mut stream = Vec::new();
        stream.extend_from_slice(&(self.bytes.len() as u32).to_le_bytes());
        stream.extend_from_slice(&original_len.to_le_bytes());
        stream.extend_from_slice(&self.bytes);
        stream
    }
}

/// Hand-built Tiano stream with one block of `symbols` symbols whose
/// Char&Length and Position tables each hold a single symbol.
fn single_symbol_stream(symbols: u32, char_symbol: u32, position_symbol: u32, original_len: u32) -> Vec<u8> {
    let mut bits = BitPacker::default();
    bits.put(16, symbols);
    // Extra table: none
    bits.put(5, 0);
    bits.put(5, 0);
    // Char&Length table: one symbol
    bits.put(9, 0);
    bits.put(9, char_symbol);
    // Position table: one symbol
    bits.put(5, 0);
    bits.put(5, position_symbol);
    bits.into_stream(original_len)
}

// --- Basic Sanity & Boundaries (Tests 1-8) ---

/// Test: Empty input round-trips and produces a header, an empty block and
/// the terminator.
#[test]
fn t01_empty_input() {
    assert_round_trip(b"");

    let compressed = compress_to_vec(b"", Format::Tiano).unwrap();
    let (compressed_len, original_len) = header_fields(&compressed);
    assert_eq!(original_len, 0);
    assert_eq!(compressed_len, compressed.len() - HEADER_LEN);
    assert_eq!(decompress_to_vec(&compressed, Format::Tiano).unwrap(), b"");
}

/// Test: Single byte input.
#[test]
fn t02_single_byte() {
    assert_round_trip(b"A");
}

/// Test: Two and three byte inputs, below and at the minimum match length.
#[test]
fn t03_tiny_strings() {
    assert_round_trip(b"Hi");
    assert_round_trip(b"abc");
    assert_round_trip(b"aaa");
    assert_round_trip(b"aaaa");
}

/// Test: Header fields are patched with the true sizes.
#[test]
fn t04_header_patch() {
    let input = generate_text(5000);
    for format in [Format::Tiano, Format::Efi] {
        let compressed = compress_to_vec(&input, format).unwrap();
        let (compressed_len, original_len) = header_fields(&compressed);
        assert_eq!(original_len, input.len());
        assert_eq!(compressed_len + HEADER_LEN, compressed.len());
        assert_eq!(compressed.last(), Some(&0), "Stream must end with the terminator byte");

        let info = get_info(&compressed).unwrap();
        assert_eq!(info.total_len(), compressed.len());
    }
}

/// Test: One byte short of the requirement reports the exact size and leaves
/// the destination untouched; the exact size succeeds.
#[test]
fn t05_capacity_boundary() {
    let input = generate_text(3000);
    let required = compress_to_vec(&input, Format::Tiano).unwrap().len();

    let mut short = vec![0u8; required - 1];
    assert_eq!(
        compress(&input, &mut short),
        Err(Error::BufferTooSmall { required })
    );
    assert!(short.iter().all(|&b| b == 0), "Nothing is written on failure");

    let mut exact = vec![0u8; required];
    assert_eq!(compress(&input, &mut exact), Ok(required));
    assert_round_trip(&input);
}

/// Test: An empty destination reports the size needed.
#[test]
fn t06_zero_capacity() {
    let input = b"firmware";
    let required = compress_to_vec(input, Format::Efi).unwrap().len();
    assert_eq!(
        compress_with_format(input, &mut [], Format::Efi),
        Err(Error::BufferTooSmall { required })
    );
}

/// Test: A larger destination is accepted and only the stream prefix is written.
#[test]
fn t07_oversized_destination() {
    let input = generate_text(700);
    let mut out = vec![0xEEu8; 4096];
    let written = compress(&input, &mut out).unwrap();
    assert!(written < out.len());
    assert!(out[written..].iter().all(|&b| b == 0xEE));

    let mut restored = vec![0u8; input.len()];
    decompress(&out, &mut restored, 2).unwrap();
    assert_eq!(restored, input);
}

/// Test: Slice and vector outputs produce identical streams.
#[test]
fn t08_slice_matches_vec() {
    let input = generate_random(10_000, 7);
    let expected = compress_to_vec(&input, Format::Tiano).unwrap();
    let mut out = vec![0u8; expected.len()];
    compress(&input, &mut out).unwrap();
    assert_eq!(out, expected);
}

// --- Compression Logic & Patterns (Tests 9-20) ---

/// Test: Repeated single byte.
#[test]
fn t09_rle_simple() {
    let input = vec![b'A'; 100];
    let compressed = compress_to_vec(&input, Format::Tiano).unwrap();
    assert!(compressed.len() < 40);
    assert_round_trip(&input);
}

/// Test: All zeros (common flash padding pattern).
#[test]
fn t10_all_zeros() {
    let input = vec![0u8; 64 * 1024];
    let compressed = compress_to_vec(&input, Format::Tiano).unwrap();
    assert!(compressed.len() < 1024);
    assert_round_trip(&input);
}

/// Test: Alternating pattern (0xAA, 0x55).
#[test]
fn t11_alternating_pattern() {
    let input: Vec<u8> = (0..10_000).map(|i| if i % 2 == 0 { 0xAA } else { 0x55 }).collect();
    assert_round_trip(&input);
}

/// Test: Every byte value once; no matches possible.
#[test]
fn t12_all_byte_values() {
    let input: Vec<u8> = (0..=255).collect();
    assert_round_trip(&input);
}

/// Test: High entropy data survives and expands only by table overhead.
#[test]
fn t13_random_noise() {
    let input = generate_random(20_000, 0xDEAD_BEEF);
    let compressed = compress_to_vec(&input, Format::Tiano).unwrap();
    assert!(compressed.len() < input.len() + input.len() / 8);
    assert_round_trip(&input);
}

/// Test: Repeating phrases (standard text compression).
#[test]
fn t14_repeating_phrases() {
    let input = generate_text(50_000);
    let compressed = compress_to_vec(&input, Format::Tiano).unwrap();
    assert!(compressed.len() < input.len() / 10);
    assert_round_trip(&input);
}

/// Test: Matches longer than the maximum match length are split.
#[test]
fn t15_runs_beyond_max_match() {
    for len in [255, 256, 257, 258, 512, 513, 1000] {
        let mut input = b"prefix".to_vec();
        input.extend(std::iter::repeat_n(b'z', len));
        input.extend_from_slice(b"suffix");
        assert_round_trip(&input);
    }
}

/// Test: Enough tokens to need several blocks.
#[test]
fn t16_multiple_blocks() {
    let mut input = generate_random(60_000, 3);
    input.extend(generate_text(60_000));
    input.extend(generate_random(60_000, 4));
    assert_round_trip(&input);
}

/// Test: Input several legacy windows long, with repeats farther apart than
/// the legacy window.
#[test]
fn t17_longer_than_window() {
    let block = generate_random(12_000, 11);
    let mut input = block.clone();
    input.extend(generate_text(5000));
    input.extend_from_slice(&block);
    input.extend_from_slice(&block);
    assert_round_trip(&input);
}

/// Test: A single repeated byte longer than the Tiano window.
#[test]
fn t18_degenerate_run_beyond_window() {
    let input = vec![0x5Au8; (1 << 19) + 4096];
    assert_round_trip_with(&input, Format::Tiano);

    let input = vec![0x5Au8; 3 * (1 << 13) + 17];
    assert_round_trip_with(&input, Format::Efi);
}

/// Test: The larger window finds repeats the legacy window cannot.
#[test]
fn t19_tiano_window_reaches_farther() {
    let block = generate_random(16_000, 21);
    let mut input = block.clone();
    input.extend_from_slice(&block);

    let tiano = compress_to_vec(&input, Format::Tiano).unwrap();
    let efi = compress_to_vec(&input, Format::Efi).unwrap();
    assert!(tiano.len() < efi.len());
    assert_round_trip(&input);
}

/// Test: UTF-8 content.
#[test]
fn t20_unicode_bytes() {
    assert_round_trip("おはようございます、おはようございます".as_bytes());
}

// --- Decompression Error Handling (Tests 21-32) ---

/// Test: Source shorter than the header.
#[test]
fn t21_truncated_header() {
    let mut out = [0u8; 4];
    assert!(matches!(
        decompress(&[1, 0, 0, 0, 4, 0, 0], &mut out, 2),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(get_info(&[]), Err(Error::InvalidParameter(_))));
}

/// Test: Header claims more payload than available.
#[test]
fn t22_truncated_payload() {
    let compressed = compress_to_vec(&generate_text(1000), Format::Tiano).unwrap();
    let cut = &compressed[..compressed.len() - 1];
    assert_eq!(
        get_info(cut),
        Err(Error::InvalidData(Corruption::TruncatedStream))
    );
    assert_eq!(
        decompress_to_vec(cut, Format::Tiano),
        Err(Error::InvalidData(Corruption::TruncatedStream))
    );
}

/// Test: Unknown format versions are rejected.
#[test]
fn t23_unknown_version() {
    let compressed = compress_to_vec(b"abc", Format::Tiano).unwrap();
    let mut out = [0u8; 3];
    for version in [0, 3, 255] {
        assert!(matches!(
            decompress(&compressed, &mut out, version),
            Err(Error::InvalidParameter(_))
        ));
    }
}

/// Test: Destination length must equal the original length.
#[test]
fn t24_destination_length_mismatch() {
    let compressed = compress_to_vec(b"hello hello", Format::Tiano).unwrap();
    let mut small = [0u8; 10];
    let mut large = [0u8; 12];
    assert!(matches!(
        decompress(&compressed, &mut small, 2),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        decompress(&compressed, &mut large, 2),
        Err(Error::InvalidParameter(_))
    ));
}

/// Test: Flipping a bit in an Extra table length breaks the Kraft equality.
#[test]
fn t25_corrupt_extra_table_length() {
    let input = generate_text(4000);
    let mut compressed = compress_to_vec(&input, Format::Tiano).unwrap();

    let mut cursor = BitCursor {
        data: &compressed[HEADER_LEN..],
        pos: 0,
    };
    cursor.get(16);
    let count = cursor.get(5);
    assert!(count > 0, "Text should produce a non-trivial Extra table");

    // First length sent in the short three-bit form.
    let (field, value) = loop {
        let field = cursor.pos;
        let value = cursor.get(3);
        if value < 7 {
            break (field, value);
        }
        while cursor.get(1) == 1 {}
    };

    let flip = if value == 6 { 0b010 } else { 0b001 };
    let bit = field + if flip == 0b010 { 1 } else { 2 };
    compressed[HEADER_LEN + bit / 8] ^= 0x80 >> (bit % 8);

    let mut out = vec![0u8; input.len()];
    assert_eq!(
        decompress(&compressed, &mut out, 2),
        Err(Error::InvalidData(Corruption::BadTable))
    );
}

/// Test: Every single-bit flip in the table region is rejected or decodes
/// without panicking.
#[test]
fn t26_bit_flips_never_panic() {
    let input = generate_text(2000);
    let compressed = compress_to_vec(&input, Format::Tiano).unwrap();
    let mut out = vec![0u8; input.len()];

    for bit in 0..(64 * 8).min((compressed.len() - HEADER_LEN) * 8) {
        let mut corrupt = compressed.clone();
        corrupt[HEADER_LEN + bit / 8] ^= 0x80 >> (bit % 8);
        let _ = decompress(&corrupt, &mut out, 2);
    }
}

/// Test: A back-reference before the start of the output.
#[test]
fn t27_invalid_offset() {
    // One match of length 3 (symbol 256) at distance 1 with nothing decoded yet.
    let stream = single_symbol_stream(1, 256, 0, 3);
    assert_eq!(
        decompress_to_vec(&stream, Format::Tiano),
        Err(Error::InvalidData(Corruption::InvalidOffset))
    );
}

/// Test: A single-symbol table naming a symbol outside its alphabet.
#[test]
fn t28_single_symbol_out_of_range() {
    let stream = single_symbol_stream(1, 511, 0, 1);
    assert_eq!(
        decompress_to_vec(&stream, Format::Tiano),
        Err(Error::InvalidData(Corruption::SymbolOutOfRange))
    );
}

/// Test: A hand-built literal-only block decodes.
#[test]
fn t29_hand_built_literal_block() {
    let stream = single_symbol_stream(4, u32::from(b'x'), 0, 4);
    assert_eq!(decompress_to_vec(&stream, Format::Tiano).unwrap(), b"xxxx");
}

/// Test: Output stops at the original length even if more symbols follow.
#[test]
fn t30_stops_at_original_length() {
    let stream = single_symbol_stream(100, u32::from(b'q'), 0, 7);
    assert_eq!(decompress_to_vec(&stream, Format::Tiano).unwrap(), b"qqqqqqq");
}

/// Test: A block that runs out of symbols while output is owed is followed by
/// a zero-symbol block, which is rejected.
#[test]
fn t31_empty_block_while_output_owed() {
    let stream = single_symbol_stream(2, u32::from(b'q'), 0, 5);
    assert_eq!(
        decompress_to_vec(&stream, Format::Tiano),
        Err(Error::InvalidData(Corruption::EmptyBlock))
    );
}

/// Test: Trailing bytes after the declared payload are ignored.
#[test]
fn t32_trailing_garbage_ignored() {
    let input = generate_text(800);
    let mut compressed = compress_to_vec(&input, Format::Efi).unwrap();
    compressed.extend_from_slice(&[0xFF; 32]);
    assert_eq!(decompress_to_vec(&compressed, Format::Efi).unwrap(), input);
}

// --- Format Interop (Tests 33-36) ---

/// Test: Version numbers map onto the formats.
#[test]
fn t33_version_numbers() {
    let input = generate_text(1500);
    for format in [Format::Efi, Format::Tiano] {
        let compressed = compress_to_vec(&input, format).unwrap();
        let mut out = vec![0u8; input.len()];
        decompress(&compressed, &mut out, format.version()).unwrap();
        assert_eq!(out, input);
        assert_eq!(Format::from_version(format.version()), Ok(format));
    }
}

/// Test: Tiano is the default format and the shorthand entry point's format.
#[test]
fn t34_default_format() {
    assert_eq!(Format::default(), Format::Tiano);
    let input = generate_text(900);
    let mut out = vec![0u8; 2048];
    let written = compress(&input, &mut out).unwrap();
    assert_eq!(&out[..written], compress_to_vec(&input, Format::Tiano).unwrap());
}

/// Test: Window and Position header parameters.
#[test]
fn t35_format_parameters() {
    assert_eq!(Format::Efi.window_bits(), 13);
    assert_eq!(Format::Tiano.window_bits(), 19);
    assert_eq!(Format::Efi.position_bits(), 4);
    assert_eq!(Format::Tiano.position_bits(), 5);
}

/// Test: Compression is deterministic.
#[test]
fn t36_deterministic_output() {
    let input = generate_random(5000, 99);
    assert_eq!(
        compress_to_vec(&input, Format::Tiano).unwrap(),
        compress_to_vec(&input, Format::Tiano).unwrap()
    );
}
