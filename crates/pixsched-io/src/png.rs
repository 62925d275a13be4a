//! PNG format support.
//!
//! Reads 8-bit and 16-bit PNGs into 8-bit [`Image`]s:
//!
//! - palette and sub-byte gray images are expanded to 8 bits
//! - 16-bit samples keep their high byte
//! - grayscale becomes RGB, grayscale+alpha becomes RGBA
//!
//! # Example
//!
//! ```rust,ignore
//! use pixsched_io::png;
//!
//! let image = png::read("rgb.png")?;
//! png::write("out.png", &image)?;
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use pixsched_core::Image;
use tracing::{debug, trace};

use crate::{IoError, IoResult};

/// Reads a PNG file from the given path.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let path = path.as_ref();
    trace!(path = %path.display(), "png::read");

    let file = File::open(path)?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::DecodeError("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::DecodeError(e.to_string()))?;
    let bytes = &buf[..info.buffer_size()];

    let (channels, data) = match (info.color_type, info.bit_depth) {
        (png::ColorType::Rgb, png::BitDepth::Eight) => (3, bytes.to_vec()),
        (png::ColorType::Rgba, png::BitDepth::Eight) => (4, bytes.to_vec()),
        (png::ColorType::Rgb, png::BitDepth::Sixteen) => (3, high_bytes(bytes)),
        (png::ColorType::Rgba, png::BitDepth::Sixteen) => (4, high_bytes(bytes)),
        (png::ColorType::Grayscale, png::BitDepth::Eight) => {
            (3, bytes.iter().flat_map(|&g| [g, g, g]).collect())
        }
        (png::ColorType::Grayscale, png::BitDepth::Sixteen) => {
            (3, high_bytes(bytes).into_iter().flat_map(|g| [g, g, g]).collect())
        }
        (png::ColorType::GrayscaleAlpha, png::BitDepth::Eight) => (
            4,
            bytes.chunks_exact(2).flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]]).collect(),
        ),
        (png::ColorType::GrayscaleAlpha, png::BitDepth::Sixteen) => (
            4,
            high_bytes(bytes).chunks_exact(2).flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]]).collect(),
        ),
        (color_type, bit_depth) => {
            return Err(IoError::UnsupportedBitDepth(format!(
                "{:?} {:?}",
                color_type, bit_depth
            )));
        }
    };

    debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        channels,
        "decoded png"
    );

    Ok(Image::from_data(info.width, info.height, channels, data)?)
}

/// Writes an 8-bit image to a PNG file.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let path = path.as_ref();
    trace!(path = %path.display(), extent = %image.extent(), "png::write");

    let color_type = match image.channels() {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => return Err(IoError::EncodeError(format!("unsupported channel count: {}", n))),
    };

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), image.height());
    encoder.set_color(color_type);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::default());

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer
        .write_image_data(image.data())
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer
        .finish()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;

    Ok(())
}

/// Keeps the most significant byte of big-endian 16-bit samples.
fn high_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.chunks_exact(2).map(|pair| pair[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_bytes() {
        assert_eq!(high_bytes(&[0x12, 0x34, 0xff, 0x00]), vec![0x12, 0xff]);
    }

    #[test]
    fn test_roundtrip_rgb() {
        let image = Image::from_fn(32, 16, 3, |x, y, c| match c {
            0 => (x * 8) as u8,
            1 => (y * 8) as u8,
            _ => 128,
        })
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        write(&path, &image).unwrap();

        let loaded = read(&path).unwrap();
        assert_eq!(loaded.extent(), image.extent());
        assert_eq!(loaded.data(), image.data());
    }

    #[test]
    fn test_reject_five_channels() {
        let image = Image::filled(2, 2, 5, 0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = write(dir.path().join("bad.png"), &image).unwrap_err();
        assert!(matches!(err, IoError::EncodeError(_)));
    }
}
