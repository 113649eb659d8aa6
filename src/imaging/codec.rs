//! Format-specific serialization shared by every [`Encoder`](super::Encoder).
//!
//! | Format | Crate / function |
//! |---|---|
//! | JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! Both encoders are deterministic for a fixed input, which is what lets the
//! direct and base64 encoder variants produce identical bytes.

use super::backend::BackendError;
use super::canvas::Canvas;
use super::params::{OutputFormat, Quality};
use image::ImageEncoder;
use std::io::Write;

/// Encode the canvas (alpha flattened over white) into `writer`.
pub fn write_encoded<W: Write>(
    writer: W,
    canvas: &Canvas,
    format: OutputFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    if canvas.width() == 0 || canvas.height() == 0 {
        return Err(BackendError::ProcessingFailed(
            "Cannot encode an empty canvas".into(),
        ));
    }
    let rgb = canvas.to_rgb_over_white();
    let (width, height) = rgb.dimensions();

    match format {
        OutputFormat::Jpeg => {
            image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value() as u8)
                .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
                .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))
        }
        OutputFormat::Avif => {
            image::codecs::avif::AvifEncoder::new_with_speed_quality(
                writer,
                6,
                quality.value() as u8,
            )
            .write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .map_err(|e| BackendError::ProcessingFailed(format!("AVIF encode failed: {e}")))
        }
    }
}

/// Encode into a fresh byte vector.
pub fn encode_to_vec(
    canvas: &Canvas,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    write_encoded(&mut buf, canvas, format, quality)?;
    Ok(buf)
}
