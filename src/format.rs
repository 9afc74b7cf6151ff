//! Stream parameters shared by the encoder and the decoder.
//!
//! Both supported formats use the same block syntax. They differ in the size of
//! the sliding window, the width of the Position table header, and whether the
//! encoder refuses far-away minimum-length matches.

use crate::error::{Corruption, Error};

/// Shortest match that is emitted as a back-reference.
pub(crate) const THRESHOLD: usize = 3;

/// Longest match the encoder will emit.
pub(crate) const MAX_MATCH: usize = 256;

/// Size of the Char&Length alphabet: 256 literals followed by the lengths
/// `THRESHOLD..=MAX_MATCH`.
pub(crate) const NC: usize = u8::MAX as usize + MAX_MATCH + 2 - THRESHOLD;

/// Bit width of the Char&Length count field.
pub(crate) const CBIT: u32 = 9;

/// Size of the Extra (meta) alphabet: 16 code lengths plus 3 zero-run codes.
pub(crate) const NT: usize = 16 + 3;

/// Bit width of the Extra count field.
pub(crate) const TBIT: u32 = 5;

/// Largest Position alphabet the decoder accepts (five-bit count field).
pub(crate) const MAX_NP: usize = (1 << 5) - 1;

/// Offset between a Char&Length symbol and the match length it encodes.
pub(crate) const LENGTH_SYMBOL_BIAS: usize = u8::MAX as usize + 1 - THRESHOLD;

/// Size of the fixed stream header: compressed length, original length.
pub const HEADER_LEN: usize = 8;

/// The two historical variants of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Version 1, the algorithm described by the UEFI specification.
    /// 8 KiB window, four-bit Position table header.
    Efi,
    /// Version 2, the EDK "Tiano" variant. 512 KiB window, five-bit
    /// Position table header.
    #[default]
    Tiano,
}

impl Format {
    /// Maps a numeric format version (1 = EFI, 2 = Tiano) to a format.
    pub const fn from_version(version: u8) -> Result<Self, Error> {
        match version {
            1 => Ok(Self::Efi),
            2 => Ok(Self::Tiano),
            _ => Err(Error::InvalidParameter("unknown format version")),
        }
    }

    #[must_use]
    pub const fn version(self) -> u8 {
        match self {
            Self::Efi => 1,
            Self::Tiano => 2,
        }
    }

    /// Number of bits addressing the sliding window.
    #[must_use]
    pub const fn window_bits(self) -> u32 {
        match self {
            Self::Efi => 13,
            Self::Tiano => 19,
        }
    }

    /// Width of the Position table count field.
    #[must_use]
    pub const fn position_bits(self) -> u32 {
        match self {
            Self::Efi => 4,
            Self::Tiano => 5,
        }
    }

    #[must_use]
    pub(crate) const fn window_size(self) -> usize {
        1 << self.window_bits()
    }

    /// Size of the Position alphabet produced by the encoder.
    #[must_use]
    pub(crate) const fn position_symbols(self) -> usize {
        self.window_bits() as usize + 1
    }

    /// Distance beyond which a minimum-length match is not worth a pointer.
    #[must_use]
    pub(crate) const fn min_match_max_distance(self) -> Option<usize> {
        match self {
            Self::Efi => None,
            Self::Tiano => Some(1 << 11),
        }
    }
}

/// Lengths declared by a stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    /// Bytes of block data following the header, including the terminator.
    pub compressed_len: usize,
    /// Bytes produced by decompressing the stream.
    pub original_len: usize,
}

impl Info {
    /// Total stream length including the header.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.compressed_len + HEADER_LEN
    }
}

/// Reads the stream header without decoding any block.
///
/// Use this to size the destination before calling [`crate::decompress`].
pub fn get_info(src: &[u8]) -> Result<Info, Error> {
    let Some((header, body)) = src.split_first_chunk::<HEADER_LEN>() else {
        return Err(Error::InvalidParameter("source shorter than stream header"));
    };

    let compressed_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let original_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    if compressed_len > body.len() {
        return Err(Corruption::TruncatedStream.into());
    }

    Ok(Info {
        compressed_len,
        original_len,
    })
}
