//! # EFI / Tiano Compression
//!
//! `tianocompress` is a safe, pure-Rust implementation of the compression
//! format used to shrink UEFI firmware volumes: LZ77 matching over a sliding
//! window, followed by per-block canonical Huffman coding of literals, match
//! lengths and match positions.
//!
//! Two variants exist. [`Format::Efi`] (version 1) is the algorithm from the
//! UEFI specification; [`Format::Tiano`] (version 2) widens the window and the
//! Position table header. Streams start with an 8-byte header carrying the
//! compressed and original lengths.
//!
//! ## Example
//!
//! ```rust
//! use tianocompress::{compress, decompress, get_info};
//!
//! let original = b"Firmware File System, Firmware File System, Firmware File System";
//!
//! let mut compressed = [0u8; 256];
//! let written = compress(original, &mut compressed).expect("Compression failed");
//!
//! let info = get_info(&compressed[..written]).unwrap();
//! assert_eq!(info.original_len, original.len());
//!
//! let mut buffer = vec![0u8; info.original_len];
//! decompress(&compressed[..written], &mut buffer, 2).expect("Decompression failed");
//! assert_eq!(buffer, original);
//! ```

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::vec::Vec;

mod bits;
pub mod compress;
pub mod decompress;
pub mod error;
pub mod format;
mod huffman;
mod match_finder;

pub use compress::{compress, compress_to_vec, compress_with_format};
pub use decompress::{decompress, decompress_to_vec, decompress_with_format};
pub use error::{Corruption, Error};
pub use format::{Format, HEADER_LEN, Info, get_info};

/// Allocates `len` default values, reporting failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    buf.resize(len, T::default());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn test_round_trip() {
        let original = b"Hello world repeated Hello world repeated Hello world repeated";
        let compressed = compress_to_vec(original, Format::Tiano).unwrap();
        let decompressed = decompress_to_vec(&compressed, Format::Tiano).unwrap();
        assert_eq!(original.to_vec(), decompressed);
    }

    #[test]
    fn test_compress_rle() {
        let original = vec![b'A'; 100];
        let compressed = compress_to_vec(&original, Format::Tiano).unwrap();
        assert!(compressed.len() < original.len());

        let mut decompressed = vec![0u8; original.len()];
        decompress(&compressed, &mut decompressed, 2).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn test_incompressible() {
        let original: Vec<u8> = (0..200u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
        let compressed = compress_to_vec(&original, Format::Efi).unwrap();
        let decompressed = decompress_to_vec(&compressed, Format::Efi).unwrap();
        assert_eq!(original, decompressed);
    }

    #[test]
    fn test_version_selects_format() {
        let original = b"abcabcabcabcabcabc";
        let compressed = compress_to_vec(original, Format::Efi).unwrap();
        let mut out = [0u8; 18];
        decompress(&compressed, &mut out, 1).unwrap();
        assert_eq!(&out, original);
        assert!(matches!(
            decompress(&compressed, &mut out, 0),
            Err(Error::InvalidParameter(_))
        ));
    }
}
