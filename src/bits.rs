//! MSB-first bit packing for the encoder and bit extraction for the decoder.

use alloc::vec::Vec;

/// Packs variable-width codes into bytes, most significant bit first.
pub(crate) struct BitWriter<'a> {
    out: &'a mut Vec<u8>,
    sub_bit_buf: u32,
    /// Free bits left in `sub_bit_buf`.
    bit_count: u32,
}

impl<'a> BitWriter<'a> {
    pub(crate) const fn new(out: &'a mut Vec<u8>) -> Self {
        Self {
            out,
            sub_bit_buf: 0,
            bit_count: 8,
        }
    }

    /// Appends the low `n` bits of `value`.
    #[inline]
    pub(crate) fn put_bits(&mut self, mut n: u32, value: u32) {
        debug_assert!(n <= 24);
        let value = value & ((1u32 << n) - 1);

        while n >= self.bit_count {
            n -= self.bit_count;
            self.out.push((self.sub_bit_buf | (value >> n)) as u8);
            self.sub_bit_buf = 0;
            self.bit_count = 8;
        }

        self.bit_count -= n;
        self.sub_bit_buf |= value << self.bit_count;
    }

    /// Appends a whole byte, ignoring any pending bits.
    pub(crate) fn put_byte(&mut self, byte: u8) {
        self.out.push(byte);
    }

    /// Pushes out a partially filled byte, zero padded. Pending bits that do not
    /// reach a byte boundary are dropped.
    pub(crate) fn flush(&mut self) {
        self.put_bits(7, 0);
    }

    /// Overwrites already written bytes starting at `at`.
    pub(crate) fn patch(&mut self, at: usize, bytes: &[u8]) {
        self.out[at..at + bytes.len()].copy_from_slice(bytes);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.out.len()
    }
}

/// Reads MSB-first codes from a byte slice.
///
/// Keeps at least 32 bits of look-ahead. Reads past the end of the slice yield
/// zero bits.
pub(crate) struct BitReader<'a> {
    src: &'a [u8],
    pos: usize,
    buf: u64,
    /// Valid bits in the low end of `buf`.
    count: u32,
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(src: &'a [u8]) -> Self {
        let mut reader = Self {
            src,
            pos: 0,
            buf: 0,
            count: 0,
        };
        reader.refill();
        reader
    }

    #[inline]
    fn refill(&mut self) {
        while self.count <= 56 {
            let byte = match self.src.get(self.pos) {
                Some(&b) => {
                    self.pos += 1;
                    b
                }
                None => 0,
            };
            self.buf = (self.buf << 8) | u64::from(byte);
            self.count += 8;
        }
    }

    /// The next 32 bits of the stream without consuming them.
    #[inline]
    pub(crate) const fn peek_bits(&self) -> u32 {
        (self.buf >> (self.count - 32)) as u32
    }

    /// Consumes `n` bits.
    #[inline]
    pub(crate) fn fill_bits(&mut self, n: u32) {
        debug_assert!(n <= 32);
        self.count -= n;
        self.refill();
    }

    /// Consumes and returns the next `n` bits.
    #[inline]
    pub(crate) fn get_bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        let value = self.peek_bits() >> (32 - n);
        self.fill_bits(n);
        value
    }
}
