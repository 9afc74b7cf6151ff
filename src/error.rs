use thiserror::Error;

/// Errors returned by the compressor and decompressor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Scratch memory allocation failed")]
    OutOfMemory,

    #[error("Destination buffer too small, {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("Malformed compressed data: {0}")]
    InvalidData(Corruption),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// The specific inconsistency found in a compressed stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    #[error("inconsistent Huffman table")]
    BadTable,

    #[error("back-reference before start of output")]
    InvalidOffset,

    #[error("declared compressed size exceeds input")]
    TruncatedStream,

    #[error("block declares no symbols")]
    EmptyBlock,

    #[error("symbol outside its alphabet")]
    SymbolOutOfRange,
}

impl From<Corruption> for Error {
    fn from(value: Corruption) -> Self {
        Self::InvalidData(value)
    }
}
