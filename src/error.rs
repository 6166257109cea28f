//! Error surface shared by encoding and decoding.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid channel count {0}, expected 3 or 4")]
    InvalidChannels(u8),

    #[error("invalid colorspace tag {0}, expected 0 (srgb) or 1 (linear)")]
    InvalidColorspace(u8),

    #[error("invalid colorspace {0:?}, expected \"srgb\" or \"linear\"")]
    InvalidColorspaceName(String),

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize { expected: u64, actual: u64 },

    #[error("stream is {0} bytes, a header needs 14")]
    TruncatedHeader(usize),

    #[error("bad magic {0:02x?}, expected \"qoif\"")]
    BadMagic([u8; 4]),

    #[error("stream ended inside a chunk")]
    UnexpectedEof,

    #[error("decoded size exceeds addressable memory")]
    OversizedImage,
}
