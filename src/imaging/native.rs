//! Fast path: in-memory decode with EXIF orientation applied, direct encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, GIF) | `image::ImageReader::into_decoder` |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Encode | [`codec::encode_to_vec`](super::codec::encode_to_vec) |

use super::backend::{BackendError, Decoder, Dimensions, Encoder, Surface};
use super::canvas::Canvas;
use super::codec;
use super::params::{OutputFormat, Quality};
use crate::source::{InputFormat, SourceImage};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use std::io::Cursor;

/// Reject images whose decoded pixel count would exceed `max_pixels`.
///
/// Checked from header dimensions, before any pixel memory is allocated.
pub(crate) fn ensure_within_pixel_limit(
    width: u32,
    height: u32,
    max_pixels: u64,
) -> Result<(), BackendError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(BackendError::ResourceLimit(format!(
            "{width}x{height} is {pixels} pixels (limit {max_pixels})"
        )));
    }
    Ok(())
}

/// Open an in-memory reader, trusting content sniffing first and the
/// declared MIME type second.
pub(crate) fn reader_for<'a>(
    bytes: &'a [u8],
    declared_mime: &str,
) -> Result<ImageReader<Cursor<&'a [u8]>>, BackendError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    if reader.format().is_none() {
        if let Some(format) = InputFormat::from_mime(declared_mime) {
            reader.set_format(format.image_format());
        }
    }
    Ok(reader)
}

/// Decoded RGBA pixels, orientation already applied.
pub struct DecodedSurface {
    pixels: RgbaImage,
}

impl DecodedSurface {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            pixels: image.into_rgba8(),
        }
    }
}

impl Surface for DecodedSurface {
    fn dimensions(&self) -> Dimensions {
        self.pixels.dimensions().into()
    }

    fn draw(&self, canvas: &mut Canvas, width: u32, height: u32) -> Result<(), BackendError> {
        canvas.draw_rgba(&self.pixels, width, height)
    }
}

pub struct NativeDecoder {
    max_pixels: u64,
}

impl NativeDecoder {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }
}

impl Decoder for NativeDecoder {
    fn name(&self) -> &'static str {
        "native"
    }

    fn decode(&self, source: &SourceImage) -> Result<Box<dyn Surface>, BackendError> {
        let mut decoder = reader_for(source.bytes(), source.mime())?
            .into_decoder()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to open {}: {e}", source.filename()))
            })?;

        let (width, height) = decoder.dimensions();
        ensure_within_pixel_limit(width, height, self.max_pixels)?;

        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let mut image = DynamicImage::from_decoder(decoder).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {e}", source.filename()))
        })?;
        image.apply_orientation(orientation);

        Ok(Box::new(DecodedSurface::new(image)))
    }
}

/// Encodes straight into a byte vector.
#[derive(Default)]
pub struct DirectEncoder;

impl Encoder for DirectEncoder {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn encode(
        &self,
        canvas: &Canvas,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        codec::encode_to_vec(canvas, format, quality)
    }
}
