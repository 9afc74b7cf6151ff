use alloc::vec::Vec;

use tracing::{debug, trace};

use crate::bits::BitWriter;
use crate::error::Error;
use crate::format::{
    CBIT, Format, HEADER_LEN, LENGTH_SYMBOL_BIAS, NC, NT, TBIT, THRESHOLD,
};
use crate::huffman::{TreeBuilder, kraft_sum};
use crate::match_finder::MatchFinder;
use crate::try_zeroed;

/// Size of the token buffer that bounds a block.
const BLOCK_SIZE: usize = 16 * 1024;

/// A block is sent instead of starting a new flag group this close to the end.
const BLOCK_HEADROOM: usize = 3 * 8;

/// Flag bit for the first token of a group.
const FIRST_FLAG: u8 = 0x80;

/// Buffers the literal/match decisions of one block.
///
/// Tokens are stored in groups of eight behind one flag byte (MSB first,
/// 0 = literal, 1 = match). A literal is its byte. A match is its length
/// symbol minus 256 followed by the big-endian distance.
struct TokenBuffer {
    buffer: Vec<u8>,
    flag_pos: usize,
    mask: u8,
    count: usize,
}

impl TokenBuffer {
    fn new() -> Result<Self, Error> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(BLOCK_SIZE)
            .map_err(|_| Error::OutOfMemory)?;
        Ok(Self {
            buffer,
            flag_pos: 0,
            mask: 0,
            count: 0,
        })
    }

    /// True when the next token starts a new group but the buffer lacks room for it.
    fn needs_flush(&self) -> bool {
        self.mask <= 1 && self.buffer.len() >= BLOCK_SIZE - BLOCK_HEADROOM
    }

    /// Opens a new flag group when the current one is full.
    fn begin_token(&mut self) {
        self.mask >>= 1;
        if self.mask == 0 {
            self.mask = FIRST_FLAG;
            self.flag_pos = self.buffer.len();
            self.buffer.push(0);
        }
        self.count += 1;
    }

    fn push_literal(&mut self, byte: u8) {
        self.begin_token();
        self.buffer.push(byte);
    }

    fn push_match(&mut self, symbol: usize, distance: u32) {
        self.begin_token();
        self.buffer[self.flag_pos] |= self.mask;
        self.buffer.push((symbol - 256) as u8);
        self.buffer.extend_from_slice(&distance.to_be_bytes());
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.mask = 0;
        self.count = 0;
    }

    fn iter(&self) -> Tokens<'_> {
        Tokens {
            bytes: &self.buffer,
            flags: 0,
            remaining_in_group: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// Char&Length symbol below 256.
    Literal(u8),
    /// Char&Length symbol of the length, and the distance minus one.
    Match { symbol: usize, distance: u32 },
}

/// Replays a [`TokenBuffer`] in order.
struct Tokens<'a> {
    bytes: &'a [u8],
    flags: u8,
    remaining_in_group: u8,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.remaining_in_group == 0 {
            let (&flags, rest) = self.bytes.split_first()?;
            self.flags = flags;
            self.bytes = rest;
            self.remaining_in_group = 8;
        }

        let is_match = self.flags & FIRST_FLAG != 0;
        self.flags <<= 1;
        self.remaining_in_group -= 1;

        if is_match {
            let (&[symbol, d0, d1, d2, d3], rest) = self.bytes.split_first_chunk::<5>()?;
            self.bytes = rest;
            Some(Token::Match {
                symbol: symbol as usize + 256,
                distance: u32::from_be_bytes([d0, d1, d2, d3]),
            })
        } else {
            let (&byte, rest) = self.bytes.split_first()?;
            self.bytes = rest;
            Some(Token::Literal(byte))
        }
    }
}

/// A code length table and its canonical codes.
struct CodeTable {
    lens: Vec<u8>,
    codes: Vec<u16>,
}

impl CodeTable {
    fn new(symbols: usize) -> Result<Self, Error> {
        Ok(Self {
            lens: try_zeroed(symbols)?,
            codes: try_zeroed(symbols)?,
        })
    }

    #[inline]
    fn encode(&self, out: &mut BitWriter<'_>, symbol: usize) {
        out.put_bits(u32::from(self.lens[symbol]), u32::from(self.codes[symbol]));
    }
}

/// Block encoder: collects tokens and symbol statistics, then emits each
/// block with freshly built tables.
struct Encoder<'o> {
    format: Format,
    out: BitWriter<'o>,
    tokens: TokenBuffer,
    builder: TreeBuilder,

    c_freq: Vec<u32>,
    p_freq: Vec<u32>,
    t_freq: Vec<u32>,
    c_table: CodeTable,
    p_table: CodeTable,
    t_table: CodeTable,
}

impl<'o> Encoder<'o> {
    fn new(out: BitWriter<'o>, format: Format) -> Result<Self, Error> {
        let np = format.position_symbols();
        Ok(Self {
            format,
            out,
            tokens: TokenBuffer::new()?,
            builder: TreeBuilder::new(NC)?,
            c_freq: try_zeroed(NC)?,
            p_freq: try_zeroed(np)?,
            t_freq: try_zeroed(NT)?,
            c_table: CodeTable::new(NC)?,
            p_table: CodeTable::new(np)?,
            t_table: CodeTable::new(NT)?,
        })
    }

    fn output_literal(&mut self, byte: u8) {
        if self.tokens.needs_flush() {
            self.send_block();
        }
        self.tokens.push_literal(byte);
        self.c_freq[byte as usize] += 1;
    }

    fn output_match(&mut self, len: usize, distance: usize) {
        if self.tokens.needs_flush() {
            self.send_block();
        }
        let symbol = len + LENGTH_SYMBOL_BIAS;
        self.tokens.push_match(symbol, distance as u32);
        self.c_freq[symbol] += 1;
        self.p_freq[bit_len(distance)] += 1;
    }

    /// Runs the parse over `input`, deferring each match by one position so a
    /// longer match starting at the next byte wins.
    fn encode(&mut self, input: &[u8]) -> Result<(), Error> {
        let mut finder = MatchFinder::new(input, self.format)?;
        finder.clamp_to_remainder();
        let max_distance = self.format.min_match_max_distance();

        while finder.remainder() > 0 {
            let last_len = finder.match_len();
            let last_pos = finder.match_pos();
            finder.advance();
            finder.clamp_to_remainder();

            if finder.match_len() > last_len || last_len < THRESHOLD {
                self.output_literal(finder.previous_byte());
                continue;
            }

            let distance = finder.distance_from(last_pos);
            if last_len == THRESHOLD && max_distance.is_some_and(|max| distance > max) {
                self.output_literal(finder.previous_byte());
                continue;
            }

            self.output_match(last_len, distance);
            for _ in 1..last_len {
                finder.advance();
            }
            finder.clamp_to_remainder();
        }

        self.send_block();
        self.out.flush();
        Ok(())
    }

    /// Emits the buffered tokens as one self-contained block.
    fn send_block(&mut self) {
        let pbit = self.format.position_bits();
        let np = self.format.position_symbols();
        let symbols = self.tokens.count;

        let c_root = self
            .builder
            .build(&self.c_freq, &mut self.c_table.lens, &mut self.c_table.codes);
        self.out.put_bits(16, symbols as u32);

        if c_root >= NC {
            self.count_t_freq();
            let t_root = self
                .builder
                .build(&self.t_freq, &mut self.t_table.lens, &mut self.t_table.codes);
            if t_root >= NT {
                debug_assert_eq!(kraft_sum(&self.t_table.lens), 1 << 16);
                write_pt_len(&mut self.out, &self.t_table.lens, TBIT, Some(3));
            } else {
                self.out.put_bits(TBIT, 0);
                self.out.put_bits(TBIT, t_root as u32);
            }
            debug_assert_eq!(kraft_sum(&self.c_table.lens), 1 << 16);
            self.write_c_len();
        } else {
            self.out.put_bits(TBIT, 0);
            self.out.put_bits(TBIT, 0);
            self.out.put_bits(CBIT, 0);
            self.out.put_bits(CBIT, c_root as u32);
        }

        let p_root = self
            .builder
            .build(&self.p_freq, &mut self.p_table.lens, &mut self.p_table.codes);
        if p_root >= np {
            debug_assert_eq!(kraft_sum(&self.p_table.lens), 1 << 16);
            write_pt_len(&mut self.out, &self.p_table.lens, pbit, None);
        } else {
            self.out.put_bits(pbit, 0);
            self.out.put_bits(pbit, p_root as u32);
        }

        trace!(symbols, c_root, p_root, "sending block");

        for token in self.tokens.iter() {
            match token {
                Token::Literal(byte) => self.c_table.encode(&mut self.out, byte as usize),
                Token::Match { symbol, distance } => {
                    self.c_table.encode(&mut self.out, symbol);
                    let bits = bit_len(distance as usize);
                    self.p_table.encode(&mut self.out, bits);
                    if bits > 1 {
                        self.out.put_bits(bits as u32 - 1, distance);
                    }
                }
            }
        }

        self.tokens.clear();
        self.c_freq.fill(0);
        self.p_freq.fill(0);
    }

    /// Frequencies of the Extra alphabet needed to send the Char&Length lengths.
    fn count_t_freq(&mut self) {
        self.t_freq.fill(0);
        for run in LengthRuns::new(&self.c_table.lens) {
            match run {
                LengthRun::Code(len) => self.t_freq[len as usize + 2] += 1,
                LengthRun::Zeros(count) if count <= 2 => self.t_freq[0] += count as u32,
                LengthRun::Zeros(count) if count <= 18 => self.t_freq[1] += 1,
                LengthRun::Zeros(19) => {
                    self.t_freq[0] += 1;
                    self.t_freq[1] += 1;
                }
                LengthRun::Zeros(_) => self.t_freq[2] += 1,
            }
        }
    }

    /// Sends the Char&Length lengths through the Extra code.
    fn write_c_len(&mut self) {
        let lens = &self.c_table.lens;
        let used = lens.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1);
        self.out.put_bits(CBIT, used as u32);

        let t = &self.t_table;
        for run in LengthRuns::new(lens) {
            match run {
                LengthRun::Code(len) => t.encode(&mut self.out, len as usize + 2),
                LengthRun::Zeros(count) if count <= 2 => {
                    for _ in 0..count {
                        t.encode(&mut self.out, 0);
                    }
                }
                LengthRun::Zeros(count) if count <= 18 => {
                    t.encode(&mut self.out, 1);
                    self.out.put_bits(4, count as u32 - 3);
                }
                LengthRun::Zeros(19) => {
                    t.encode(&mut self.out, 0);
                    t.encode(&mut self.out, 1);
                    self.out.put_bits(4, 15);
                }
                LengthRun::Zeros(count) => {
                    t.encode(&mut self.out, 2);
                    self.out.put_bits(CBIT, count as u32 - 20);
                }
            }
        }
    }
}

/// Sends a short length table (Extra or Position): a count, then each length
/// as three bits, or as `len - 4` ones and a zero from seven upwards.
///
/// With `special = Some(i)`, a two-bit count of zero lengths (up to index 6)
/// follows the `i`-th length.
fn write_pt_len(
    out: &mut BitWriter<'_>,
    lens: &[u8],
    nbit: u32,
    special: Option<usize>,
) {
    let used = lens.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1);
    out.put_bits(nbit, used as u32);

    let mut i = 0;
    while i < used {
        let len = u32::from(lens[i]);
        i += 1;
        if len <= 6 {
            out.put_bits(3, len);
        } else {
            out.put_bits(len - 3, (1 << (len - 3)) - 2);
        }
        if special == Some(i) {
            while i < 6 && lens.get(i) == Some(&0) {
                i += 1;
            }
            out.put_bits(2, (i as u32 - 3) & 3);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthRun {
    Code(u8),
    Zeros(usize),
}

/// Splits a length table, trailing zeros excluded, into non-zero lengths and
/// maximal runs of zeros.
struct LengthRuns<'a> {
    lens: &'a [u8],
}

impl<'a> LengthRuns<'a> {
    fn new(lens: &'a [u8]) -> Self {
        let used = lens.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1);
        Self { lens: &lens[..used] }
    }
}

impl Iterator for LengthRuns<'_> {
    type Item = LengthRun;

    fn next(&mut self) -> Option<LengthRun> {
        let (&first, rest) = self.lens.split_first()?;
        if first != 0 {
            self.lens = rest;
            return Some(LengthRun::Code(first));
        }
        let zeros = self.lens.iter().take_while(|&&l| l == 0).count();
        self.lens = &self.lens[zeros..];
        Some(LengthRun::Zeros(zeros))
    }
}

/// Number of significant bits in `value`.
#[inline]
const fn bit_len(value: usize) -> usize {
    (usize::BITS - value.leading_zeros()) as usize
}

/// Appends the complete stream for `input` to `output`.
fn encode_into(input: &[u8], output: &mut Vec<u8>, format: Format) -> Result<(), Error> {
    let original_len =
        u32::try_from(input.len()).map_err(|_| Error::InvalidParameter("input larger than 4 GiB"))?;

    let mut out = BitWriter::new(output);
    for _ in 0..HEADER_LEN {
        out.put_byte(0);
    }

    let mut encoder = Encoder::new(out, format)?;
    encoder.encode(input)?;
    let mut out = encoder.out;

    out.put_byte(0);
    let compressed_len = u32::try_from(out.len() - HEADER_LEN)
        .map_err(|_| Error::InvalidParameter("output larger than 4 GiB"))?;

    out.patch(0, &compressed_len.to_le_bytes());
    out.patch(4, &original_len.to_le_bytes());

    debug!(
        original = input.len(),
        compressed = out.len(),
        version = format.version(),
        "compressed stream"
    );
    Ok(())
}

/// Compresses `input` into `output` using the Tiano format.
///
/// Returns the number of bytes written. If `output` is too small the result is
/// [`Error::BufferTooSmall`] carrying the exact size needed, and `output` is
/// left untouched.
pub fn compress(input: &[u8], output: &mut [u8]) -> Result<usize, Error> {
    compress_with_format(input, output, Format::Tiano)
}

/// Compresses `input` into `output` using the given format.
///
/// The stream is an 8-byte header (compressed length, original length, both
/// little-endian `u32`), the block data, and a trailing zero byte.
pub fn compress_with_format(input: &[u8], output: &mut [u8], format: Format) -> Result<usize, Error> {
    let stream = compress_to_vec(input, format)?;
    let Some(dst) = output.get_mut(..stream.len()) else {
        return Err(Error::BufferTooSmall {
            required: stream.len(),
        });
    };
    dst.copy_from_slice(&stream);
    Ok(stream.len())
}

/// Compresses `input` into a newly allocated vector.
pub fn compress_to_vec(input: &[u8], format: Format) -> Result<Vec<u8>, Error> {
    let mut output = Vec::new();
    output
        .try_reserve(input.len() / 2 + HEADER_LEN + 64)
        .map_err(|_| Error::OutOfMemory)?;
    encode_into(input, &mut output, format)?;
    Ok(output)
}
