//! Error types for pixsched-core operations.
//!
//! # Usage
//!
//! ```rust
//! use pixsched_core::{Error, Extent, Result};
//!
//! fn check(x: u32, y: u32, extent: Extent) -> Result<()> {
//!     if x >= extent.width || y >= extent.height {
//!         return Err(Error::out_of_bounds(x, y, 0, extent));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::Extent;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or addressing images.
#[derive(Debug, Error)]
pub enum Error {
    /// Sample coordinates are outside image bounds.
    #[error("sample ({x}, {y}, {c}) out of bounds for image {extent}")]
    OutOfBounds {
        /// X coordinate
        x: u32,
        /// Y coordinate
        y: u32,
        /// Channel
        c: u32,
        /// Image extent
        extent: Extent,
    },

    /// Invalid image dimensions.
    ///
    /// Returned when an axis is zero or the sample count overflows `usize`.
    #[error("invalid extent {extent} ({reason})")]
    InvalidExtent {
        /// Requested extent
        extent: Extent,
        /// Why it was rejected
        reason: String,
    },

    /// Data length does not match the extent.
    #[error("buffer size mismatch: expected {expected} samples, got {actual}")]
    SizeMismatch {
        /// Samples required by the extent
        expected: usize,
        /// Samples supplied
        actual: usize,
    },
}

impl Error {
    /// Creates an [`Error::OutOfBounds`] error.
    #[inline]
    pub fn out_of_bounds(x: u32, y: u32, c: u32, extent: Extent) -> Self {
        Self::OutOfBounds { x, y, c, extent }
    }

    /// Creates an [`Error::InvalidExtent`] error.
    #[inline]
    pub fn invalid_extent(extent: Extent, reason: impl Into<String>) -> Self {
        Self::InvalidExtent {
            extent,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a bounds-related error.
    #[inline]
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds() {
        let err = Error::out_of_bounds(100, 50, 2, Extent::new(80, 60, 3));
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("80x60x3"));
        assert!(err.is_bounds_error());
    }

    #[test]
    fn test_size_mismatch() {
        let err = Error::SizeMismatch { expected: 12, actual: 11 };
        assert!(err.to_string().contains("expected 12"));
        assert!(!err.is_bounds_error());
    }
}
