//! Shared test utilities for the upload-prep test suite.
//!
//! Synthesizes small in-memory images so unit tests never depend on fixture
//! files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let src = jpeg_source("photo.jpg", 2000, 1500, 95);
//! let noisy = noise_png(64, 64, 7);
//! ```

use crate::source::SourceImage;
use image::{ImageEncoder, RgbImage, RgbaImage};

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Smooth gradient, compresses well.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// A JPEG of a gradient at the given quality.
pub fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A PNG of a gradient.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A PNG of deterministic pseudo-random noise, which compresses badly in
/// every format. `seed` selects the pattern.
pub fn noise_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let img = RgbaImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        };
        image::Rgba([next(), next(), next(), 255])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// A JPEG carrying an EXIF APP1 segment with the given orientation tag.
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let jpeg = jpeg_bytes(width, height, 90);

    let mut exif = Vec::new();
    exif.extend_from_slice(b"Exif\0\0");
    // Big-endian TIFF header, first IFD at offset 8
    exif.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
    // One IFD entry: 0x0112 Orientation, SHORT, count 1
    exif.extend_from_slice(&[0x00, 0x01]);
    exif.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    exif.extend_from_slice(&orientation.to_be_bytes());
    exif.extend_from_slice(&[0x00, 0x00]);
    // No next IFD
    exif.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let segment_len = (exif.len() + 2) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + exif.len() + 4);
    out.extend_from_slice(&jpeg[..2]); // SOI
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&exif);
    out.extend_from_slice(&jpeg[2..]);
    out
}

// =========================================================================
// Sources
// =========================================================================

pub fn jpeg_source(name: &str, width: u32, height: u32, quality: u8) -> SourceImage {
    SourceImage::new(name, "image/jpeg", jpeg_bytes(width, height, quality))
}

pub fn png_source(name: &str, width: u32, height: u32) -> SourceImage {
    SourceImage::new(name, "image/png", png_bytes(width, height))
}

/// Decode encoded bytes and return their dimensions. Panics on failure.
pub fn decoded_dimensions(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}
