//! Decode tests for pixsched-io.

use std::fs::File;
use std::io::BufWriter;

use pixsched_io::{load_image, save_image, IoError};

fn write_raw_png(path: &std::path::Path, w: u32, h: u32, color: png::ColorType, depth: png::BitDepth, data: &[u8]) {
    let file = File::create(path).unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), w, h);
    encoder.set_color(color);
    encoder.set_depth(depth);
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(data).unwrap();
    writer.finish().unwrap();
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_image(dir.path().join("rgb.png")).unwrap_err();
    assert!(matches!(err, IoError::Io(_)));
}

#[test]
fn test_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgb.png");
    std::fs::write(&path, b"definitely not a png").unwrap();
    let err = load_image(&path).unwrap_err();
    assert!(err.is_decode_error(), "unexpected error: {err}");
}

#[test]
fn test_grayscale_expands_to_rgb() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray.png");
    write_raw_png(&path, 2, 1, png::ColorType::Grayscale, png::BitDepth::Eight, &[10, 200]);

    let img = load_image(&path).unwrap();
    assert_eq!(img.channels(), 3);
    assert_eq!(img.data(), &[10, 10, 10, 200, 200, 200]);
}

#[test]
fn test_sixteen_bit_keeps_high_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep.png");
    // One RGB pixel: 0x1234, 0xff00, 0x0080
    write_raw_png(
        &path,
        1,
        1,
        png::ColorType::Rgb,
        png::BitDepth::Sixteen,
        &[0x12, 0x34, 0xff, 0x00, 0x00, 0x80],
    );

    let img = load_image(&path).unwrap();
    assert_eq!(img.data(), &[0x12, 0xff, 0x00]);
}

#[test]
fn test_save_then_load_rgba() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgba.png");
    let img = pixsched_core::Image::from_fn(3, 2, 4, |x, y, c| (x * 40 + y * 7 + c) as u8).unwrap();
    save_image(&path, &img).unwrap();
    assert_eq!(load_image(&path).unwrap(), img);
}

#[test]
fn test_sixteen_bit_gray_alpha_expands_to_rgba() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gray_alpha16.png");
    // Two pixels: (0xab12, 0x80ff) and (0x0001, 0xfe00)
    write_raw_png(
        &path,
        2,
        1,
        png::ColorType::GrayscaleAlpha,
        png::BitDepth::Sixteen,
        &[0xab, 0x12, 0x80, 0xff, 0x00, 0x01, 0xfe, 0x00],
    );

    let img = load_image(&path).unwrap();
    assert_eq!(img.channels(), 4);
    assert_eq!(img.data(), &[0xab, 0xab, 0xab, 0x80, 0x00, 0x00, 0x00, 0xfe]);
}
