use alloc::vec::Vec;

use tracing::debug;

use crate::bits::BitReader;
use crate::error::{Corruption, Error};
use crate::format::{CBIT, Format, HEADER_LEN, LENGTH_SYMBOL_BIAS, MAX_NP, NC, NT, TBIT, get_info};
use crate::huffman::MAX_CODE_LEN;
use crate::try_zeroed;

type Result<T> = core::result::Result<T, Error>;

/// Flat lookup width of the Char&Length table.
const C_TABLE_BITS: u32 = 12;

/// Flat lookup width of the Extra and Position tables.
const PT_TABLE_BITS: u32 = 8;

/// Index after which the Extra length list carries a two-bit zero-run count.
const T_SPECIAL_INDEX: usize = 3;

/// Canonical Huffman decode table rebuilt from code lengths for every block.
///
/// Codes up to `table_bits` long resolve with one lookup. Longer codes continue
/// down a small binary tree whose nodes are numbered from the alphabet size
/// upwards, one bit per level.
struct DecodeTable {
    lens: Vec<u8>,
    table: Vec<u16>,
    left: Vec<u16>,
    right: Vec<u16>,
    table_bits: u32,
}

/// A cell written while threading a long code through the tree.
#[derive(Clone, Copy)]
enum Slot {
    Table(usize),
    Left(usize),
    Right(usize),
}

impl DecodeTable {
    fn new(symbols: usize, table_bits: u32) -> Result<Self> {
        Ok(Self {
            lens: try_zeroed(symbols)?,
            table: try_zeroed(1 << table_bits)?,
            left: try_zeroed(2 * symbols - 1)?,
            right: try_zeroed(2 * symbols - 1)?,
            table_bits,
        })
    }

    #[inline]
    fn symbols(&self) -> usize {
        self.lens.len()
    }

    fn get(&self, slot: Slot) -> u16 {
        match slot {
            Slot::Table(i) => self.table[i],
            Slot::Left(i) => self.left[i],
            Slot::Right(i) => self.right[i],
        }
    }

    fn set(&mut self, slot: Slot, value: u16) {
        match slot {
            Slot::Table(i) => self.table[i] = value,
            Slot::Left(i) => self.left[i] = value,
            Slot::Right(i) => self.right[i] = value,
        }
    }

    /// Makes every code decode to `symbol` without consuming bits.
    fn fill_single(&mut self, symbol: usize) -> Result<()> {
        if symbol >= self.symbols() {
            return Err(Corruption::SymbolOutOfRange.into());
        }
        self.lens.fill(0);
        self.table.fill(symbol as u16);
        Ok(())
    }

    /// Rebuilds the lookup structures from `lens`.
    ///
    /// The lengths must form a complete prefix code.
    fn rebuild(&mut self) -> Result<()> {
        let bits = self.table_bits as usize;
        let extra_bits = MAX_CODE_LEN - bits;

        let mut count = [0u32; MAX_CODE_LEN + 1];
        for &len in &self.lens {
            let len = len as usize;
            if len > MAX_CODE_LEN {
                return Err(Corruption::BadTable.into());
            }
            count[len] += 1;
        }

        let mut start = [0u32; MAX_CODE_LEN + 2];
        for len in 1..=MAX_CODE_LEN {
            start[len + 1] = start[len] + (count[len] << (MAX_CODE_LEN - len));
        }
        if start[MAX_CODE_LEN + 1] != 1 << MAX_CODE_LEN {
            return Err(Corruption::BadTable.into());
        }

        let mut weight = [0u32; MAX_CODE_LEN + 1];
        for len in 1..=bits {
            start[len] >>= extra_bits;
            weight[len] = 1 << (bits - len);
        }
        for len in bits + 1..=MAX_CODE_LEN {
            weight[len] = 1 << (MAX_CODE_LEN - len);
        }

        // Slots holding the roots of long-code subtrees.
        let first_long = (start[bits + 1] >> extra_bits) as usize;
        if let Some(slots) = self.table.get_mut(first_long..) {
            slots.fill(0);
        }

        let mut avail = self.symbols();
        let mask = 1u32 << (MAX_CODE_LEN - 1 - bits);

        for symbol in 0..self.symbols() {
            let len = self.lens[symbol] as usize;
            if len == 0 {
                continue;
            }
            let next = start[len] + weight[len];

            if len <= bits {
                let slots = self
                    .table
                    .get_mut(start[len] as usize..next as usize)
                    .ok_or(Corruption::BadTable)?;
                slots.fill(symbol as u16);
            } else {
                let mut code = start[len];
                let mut slot = Slot::Table((code >> extra_bits) as usize);
                for _ in 0..len - bits {
                    let mut node = self.get(slot);
                    if node == 0 {
                        if avail >= self.left.len() {
                            return Err(Corruption::BadTable.into());
                        }
                        node = avail as u16;
                        self.left[avail] = 0;
                        self.right[avail] = 0;
                        self.set(slot, node);
                        avail += 1;
                    }
                    slot = if code & mask != 0 {
                        Slot::Right(node as usize)
                    } else {
                        Slot::Left(node as usize)
                    };
                    code <<= 1;
                }
                self.set(slot, symbol as u16);
            }

            start[len] = next;
        }
        Ok(())
    }

    /// Decodes one symbol and consumes its code.
    fn decode(&self, bits: &mut BitReader<'_>) -> Result<usize> {
        let peek = bits.peek_bits();
        let mut symbol = self.table[(peek >> (32 - self.table_bits)) as usize] as usize;

        let mut mask = 1u32 << (31 - self.table_bits);
        while symbol >= self.symbols() {
            if mask == 0 || symbol >= self.left.len() {
                return Err(Corruption::BadTable.into());
            }
            symbol = if peek & mask != 0 {
                self.right[symbol]
            } else {
                self.left[symbol]
            } as usize;
            mask >>= 1;
        }

        bits.fill_bits(u32::from(self.lens[symbol]));
        Ok(symbol)
    }

    /// Reads an Extra or Position length list: a count, then each length as
    /// three bits, with 7 extended by a run of one bits.
    fn read_short_lengths(
        &mut self,
        bits: &mut BitReader<'_>,
        count_bits: u32,
        special: Option<usize>,
    ) -> Result<()> {
        let count = bits.get_bits(count_bits) as usize;
        if count == 0 {
            let symbol = bits.get_bits(count_bits) as usize;
            return self.fill_single(symbol);
        }
        if count > self.symbols() {
            return Err(Corruption::BadTable.into());
        }

        self.lens.fill(0);
        let mut i = 0;
        while i < count {
            let peek = bits.peek_bits();
            let mut len = peek >> 29;
            if len == 7 {
                let mut mask = 1u32 << 28;
                while peek & mask != 0 {
                    mask >>= 1;
                    len += 1;
                    if len as usize > MAX_CODE_LEN {
                        return Err(Corruption::BadTable.into());
                    }
                }
                bits.fill_bits(len - 3);
            } else {
                bits.fill_bits(3);
            }
            self.lens[i] = len as u8;
            i += 1;

            if special == Some(i) {
                let zeros = bits.get_bits(2) as usize;
                i = (i + zeros).min(self.symbols());
            }
        }

        self.rebuild()
    }

    /// Reads the Char&Length length list, coded through the Extra table.
    fn read_char_lengths(&mut self, bits: &mut BitReader<'_>, extra: &Self) -> Result<()> {
        let count = bits.get_bits(CBIT) as usize;
        if count == 0 {
            let symbol = bits.get_bits(CBIT) as usize;
            return self.fill_single(symbol);
        }
        if count > self.symbols() {
            return Err(Corruption::BadTable.into());
        }

        self.lens.fill(0);
        let mut i = 0;
        while i < count {
            let zeros = match extra.decode(bits)? {
                0 => 1,
                1 => bits.get_bits(4) as usize + 3,
                2 => bits.get_bits(CBIT) as usize + 20,
                code => {
                    self.lens[i] = (code - 2) as u8;
                    i += 1;
                    continue;
                }
            };
            if i + zeros > self.symbols() {
                return Err(Corruption::BadTable.into());
            }
            i += zeros;
        }

        self.rebuild()
    }
}

/// A decoded Char&Length symbol with its position, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Symbol {
    Literal(u8),
    /// Copy `length` bytes starting `distance + 1` bytes back.
    Match { length: usize, distance: usize },
}

/// Reads blocks and yields one [`Symbol`] at a time.
pub(crate) struct Decoder<'a> {
    bits: BitReader<'a>,
    position_bits: u32,
    block_remaining: u32,
    c_table: DecodeTable,
    t_table: DecodeTable,
    p_table: DecodeTable,
}

impl<'a> Decoder<'a> {
    /// `payload` is the block data following the stream header.
    pub(crate) fn new(payload: &'a [u8], format: Format) -> Result<Self> {
        Ok(Self {
            bits: BitReader::new(payload),
            position_bits: format.position_bits(),
            block_remaining: 0,
            c_table: DecodeTable::new(NC, C_TABLE_BITS)?,
            t_table: DecodeTable::new(NT, PT_TABLE_BITS)?,
            p_table: DecodeTable::new(MAX_NP, PT_TABLE_BITS)?,
        })
    }

    fn read_block_header(&mut self) -> Result<()> {
        let symbols = self.bits.get_bits(16);
        if symbols == 0 {
            return Err(Corruption::EmptyBlock.into());
        }

        if let Err(err) = self.read_tables() {
            debug!(%err, symbols, "rejecting block tables");
            return Err(err);
        }

        self.block_remaining = symbols;
        Ok(())
    }

    fn read_tables(&mut self) -> Result<()> {
        self.t_table
            .read_short_lengths(&mut self.bits, TBIT, Some(T_SPECIAL_INDEX))?;
        self.c_table
            .read_char_lengths(&mut self.bits, &self.t_table)?;
        self.p_table
            .read_short_lengths(&mut self.bits, self.position_bits, None)
    }

    fn decode_position(&mut self) -> Result<usize> {
        let bits = self.p_table.decode(&mut self.bits)?;
        if bits <= 1 {
            return Ok(bits);
        }
        let extra = bits as u32 - 1;
        Ok((1usize << extra) + self.bits.get_bits(extra) as usize)
    }

    pub(crate) fn next_symbol(&mut self) -> Result<Symbol> {
        if self.block_remaining == 0 {
            self.read_block_header()?;
        }
        self.block_remaining -= 1;

        let symbol = self.c_table.decode(&mut self.bits)?;
        match u8::try_from(symbol) {
            Ok(byte) => Ok(Symbol::Literal(byte)),
            Err(_) => Ok(Symbol::Match {
                length: symbol - LENGTH_SYMBOL_BIAS,
                distance: self.decode_position()?,
            }),
        }
    }
}

/// Copies a back-reference inside `output`, stopping at its end.
///
/// Returns the new write position.
#[inline]
fn apply_match(output: &mut [u8], pos: usize, length: usize, distance: usize) -> Result<usize> {
    let Some(src) = pos.checked_sub(distance + 1) else {
        return Err(Corruption::InvalidOffset.into());
    };
    let end = (pos + length).min(output.len());

    if distance == 0 {
        let byte = output[src];
        output[pos..end].fill(byte);
    } else {
        // Byte by byte so overlapping copies repeat the pattern.
        for k in pos..end {
            output[k] = output[k - distance - 1];
        }
    }

    Ok(end)
}

fn decode_into(payload: &[u8], output: &mut [u8], format: Format) -> Result<()> {
    if output.is_empty() {
        return Ok(());
    }

    let mut decoder = Decoder::new(payload, format)?;
    let mut pos = 0;
    while pos < output.len() {
        match decoder.next_symbol()? {
            Symbol::Literal(byte) => {
                output[pos] = byte;
                pos += 1;
            }
            Symbol::Match { length, distance } => {
                pos = apply_match(output, pos, length, distance)?;
            }
        }
    }
    Ok(())
}

/// Decompresses a stream produced with format `version` (1 = EFI, 2 = Tiano).
///
/// `output` must be exactly as long as the original data; see
/// [`crate::get_info`].
pub fn decompress(input: &[u8], output: &mut [u8], version: u8) -> Result<()> {
    decompress_with_format(input, output, Format::from_version(version)?)
}

/// Decompresses a stream into `output`, which must be exactly as long as the
/// original data.
pub fn decompress_with_format(input: &[u8], output: &mut [u8], format: Format) -> Result<()> {
    let info = get_info(input)?;
    if output.len() != info.original_len {
        return Err(Error::InvalidParameter(
            "destination length differs from original length",
        ));
    }
    decode_into(&input[HEADER_LEN..info.total_len()], output, format)
}

/// Decompresses a stream into a newly allocated vector sized from its header.
pub fn decompress_to_vec(input: &[u8], format: Format) -> Result<Vec<u8>> {
    let info = get_info(input)?;
    let mut output: Vec<u8> = try_zeroed(info.original_len)?;
    decode_into(&input[HEADER_LEN..info.total_len()], &mut output, format)?;
    Ok(output)
}
