//! Image I/O for pixsched.
//!
//! Decodes input images into [`pixsched_core::Image`] and writes results back.
//! PNG is the only supported container.
//!
//! ```rust,ignore
//! let input = pixsched_io::load_image("images/rgb.png")?;
//! pixsched_io::save_image("out.png", &input)?;
//! ```

pub mod error;
pub mod png;

use std::path::Path;

pub use error::{IoError, IoResult};

use pixsched_core::Image;

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Portable Network Graphics.
    Png,
    /// Anything else.
    Unknown,
}

impl Format {
    /// Detects the format from a file extension.
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => Self::Png,
            _ => Self::Unknown,
        }
    }
}

/// Loads an image, dispatching on the file extension.
///
/// # Errors
///
/// [`IoError::Io`] when the file is missing, [`IoError::DecodeError`] when it is
/// corrupt, [`IoError::UnsupportedFormat`] for non-PNG files.
pub fn load_image<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let path = path.as_ref();
    match Format::from_extension(path) {
        Format::Png => png::read(path),
        Format::Unknown => Err(unsupported(path)),
    }
}

/// Saves an image, dispatching on the file extension.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let path = path.as_ref();
    match Format::from_extension(path) {
        Format::Png => png::write(path, image),
        Format::Unknown => Err(unsupported(path)),
    }
}

fn unsupported(path: &Path) -> IoError {
    IoError::UnsupportedFormat(
        path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_extension("a/rgb.png"), Format::Png);
        assert_eq!(Format::from_extension("RGB.PNG"), Format::Png);
        assert_eq!(Format::from_extension("rgb.exr"), Format::Unknown);
        assert_eq!(Format::from_extension("rgb"), Format::Unknown);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_image("input.tga").unwrap_err();
        assert!(matches!(err, IoError::UnsupportedFormat(ref e) if e == "tga"));
        assert!(err.is_decode_error());
    }
}
