//! Sample images addressed by `(x, y, channel)`.
//!
//! # Memory Layout
//!
//! Samples are interleaved, channel fastest, rows top-to-bottom:
//!
//! ```text
//! Memory: [R G B R G B R G B ...]  <- Row 0
//!         [R G B R G B R G B ...]  <- Row 1
//! ```
//!
//! The pixel stride is `channels`, the row stride `width * channels`.
//!
//! # Usage
//!
//! ```rust
//! use pixsched_core::Image;
//!
//! let img = Image::from_fn(4, 2, 3, |x, y, c| (x + y * 4 + c) as u8).unwrap();
//! assert_eq!(img.get(1, 1, 2), 7);
//! ```

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::{Error, Result};

/// Dimensions of a 3-D sample array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Samples per pixel
    pub channels: u32,
}

impl Extent {
    /// Creates an extent without validation.
    pub const fn new(width: u32, height: u32, channels: u32) -> Self {
        Self { width, height, channels }
    }

    /// Total sample count.
    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Returns `true` if any axis is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }

    /// Samples in one row.
    #[inline]
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Linear index of `(x, y, c)` in an interleaved buffer.
    #[inline]
    pub fn index(&self, x: u32, y: u32, c: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channels as usize + c as usize
    }

    /// Returns `true` if `(x, y, c)` addresses a sample.
    #[inline]
    pub fn contains(&self, x: u32, y: u32, c: u32) -> bool {
        x < self.width && y < self.height && c < self.channels
    }

    /// Checks that the extent is non-empty and its sample count fits in memory.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid_extent(*self, "zero-sized axis"));
        }
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(self.channels as usize))
            .ok_or_else(|| Error::invalid_extent(*self, "sample count overflows usize"))?;
        Ok(())
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Owned, immutable 8-bit image.
///
/// Cloning is cheap: the sample buffer is shared through an [`Arc`].
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    data: Arc<Vec<u8>>,
    extent: Extent,
}

impl Image {
    /// Creates an image from interleaved samples.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidExtent`] for empty extents, [`Error::SizeMismatch`]
    /// if `data.len()` differs from the extent's sample count.
    pub fn from_data(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let extent = Extent::new(width, height, channels);
        extent.validate()?;
        if data.len() != extent.len() {
            return Err(Error::SizeMismatch {
                expected: extent.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            data: Arc::new(data),
            extent,
        })
    }

    /// Creates an image with every sample set to `value`.
    pub fn filled(width: u32, height: u32, channels: u32, value: u8) -> Result<Self> {
        let extent = Extent::new(width, height, channels);
        extent.validate()?;
        Self::from_data(width, height, channels, vec![value; extent.len()])
    }

    /// Creates an image by evaluating `f(x, y, c)` for every sample.
    ///
    /// Rows are generated in parallel.
    pub fn from_fn<F>(width: u32, height: u32, channels: u32, f: F) -> Result<Self>
    where
        F: Fn(u32, u32, u32) -> u8 + Sync,
    {
        let extent = Extent::new(width, height, channels);
        extent.validate()?;
        let mut data = vec![0u8; extent.len()];
        data.par_chunks_mut(extent.row_len())
            .enumerate()
            .for_each(|(y, row)| {
                for (i, sample) in row.iter_mut().enumerate() {
                    let x = (i / channels as usize) as u32;
                    let c = (i % channels as usize) as u32;
                    *sample = f(x, y as u32, c);
                }
            });
        Self::from_data(width, height, channels, data)
    }

    /// Image extent.
    #[inline]
    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Channel count.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.extent.channels
    }

    /// Sample at `(x, y, c)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds; use [`try_get`](Self::try_get)
    /// for checked access.
    #[inline]
    pub fn get(&self, x: u32, y: u32, c: u32) -> u8 {
        debug_assert!(self.extent.contains(x, y, c));
        self.data[self.extent.index(x, y, c)]
    }

    /// Checked sample access.
    pub fn try_get(&self, x: u32, y: u32, c: u32) -> Result<u8> {
        if !self.extent.contains(x, y, c) {
            return Err(Error::out_of_bounds(x, y, c, self.extent));
        }
        Ok(self.get(x, y, c))
    }

    /// Interleaved sample data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One row of interleaved samples.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let len = self.extent.row_len();
        let start = y as usize * len;
        &self.data[start..start + len]
    }

    /// Consumes the image, returning its samples (copies if shared).
    pub fn into_data(self) -> Vec<u8> {
        Arc::try_unwrap(self.data).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("extent", &self.extent)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}
