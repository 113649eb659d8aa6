//! Compatibility path: everything goes through a `data:` URL.
//!
//! The decoder loads bytes the way an image element would: build a data URL,
//! load it back, read the natural size, then optionally run a second
//! decode-completion step for orientation metadata. Failures of that last step
//! are logged and ignored; the loaded image is authoritative.
//!
//! The encoder serializes into base64 text first and decodes it back into
//! bytes. The round trip is lossless, so output is byte-for-byte identical to
//! [`DirectEncoder`](super::native::DirectEncoder).

use super::backend::{BackendError, Decoder, Encoder, Surface};
use super::canvas::Canvas;
use super::codec;
use super::native::{DecodedSurface, ensure_within_pixel_limit, reader_for};
use super::params::{OutputFormat, Quality};
use crate::source::SourceImage;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageDecoder;
use image::metadata::Orientation;

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and decoded bytes.
pub fn parse_data_url(url: &str) -> Result<(String, Vec<u8>), BackendError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| BackendError::ProcessingFailed("Not a data URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| BackendError::ProcessingFailed("Data URL has no payload".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| BackendError::ProcessingFailed("Data URL is not base64".into()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| BackendError::ProcessingFailed(format!("Invalid base64 payload: {e}")))?;
    Ok((mime.to_string(), bytes))
}

pub struct DataUrlDecoder {
    max_pixels: u64,
}

impl DataUrlDecoder {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    /// Orientation from embedded metadata. Best effort.
    fn await_decode(bytes: &[u8], mime: &str) -> Result<Orientation, BackendError> {
        let mut decoder = reader_for(bytes, mime)?
            .into_decoder()
            .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
        decoder
            .orientation()
            .map_err(|e| BackendError::ProcessingFailed(e.to_string()))
    }
}

impl Decoder for DataUrlDecoder {
    fn name(&self) -> &'static str {
        "compat"
    }

    fn decode(&self, source: &SourceImage) -> Result<Box<dyn Surface>, BackendError> {
        let url = to_data_url(source.mime(), source.bytes());
        let (mime, bytes) = parse_data_url(&url)?;

        let (width, height) = reader_for(&bytes, &mime)?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to load {}: {e}", source.filename()))
            })?;
        ensure_within_pixel_limit(width, height, self.max_pixels)?;

        let mut image = reader_for(&bytes, &mime)?.decode().map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to load {}: {e}", source.filename()))
        })?;

        match Self::await_decode(&bytes, &mime) {
            Ok(orientation) => image.apply_orientation(orientation),
            Err(e) => log::debug!("{}: decode step ignored: {e}", source.filename()),
        }

        Ok(Box::new(DecodedSurface::new(image)))
    }
}

/// Encodes to base64 text, then decodes that text into the final bytes.
#[derive(Default)]
pub struct Base64Encoder;

impl Base64Encoder {
    pub fn encode_to_data_url(
        canvas: &Canvas,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<String, BackendError> {
        let mut writer = base64::write::EncoderStringWriter::new(&STANDARD);
        codec::write_encoded(&mut writer, canvas, format, quality)?;
        Ok(format!(
            "data:{};base64,{}",
            format.mime_type(),
            writer.into_inner()
        ))
    }
}

impl Encoder for Base64Encoder {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn encode(
        &self,
        canvas: &Canvas,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let url = Self::encode_to_data_url(canvas, format, quality)?;
        let (_, bytes) = parse_data_url(&url)?;
        Ok(bytes)
    }
}
