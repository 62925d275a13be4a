//! Error types for image I/O.

use std::io;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported file format.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoding error (corrupt or truncated file).
    #[error("decode error: {0}")]
    DecodeError(String),

    /// Encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Unsupported color type / bit depth combination.
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(String),

    /// Decoded data does not form a valid image.
    #[error(transparent)]
    Image(#[from] pixsched_core::Error),
}

impl IoError {
    /// Returns `true` if the file could be opened but not decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::DecodeError(_) | Self::UnsupportedBitDepth(_) | Self::UnsupportedFormat(_)
        )
    }
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
