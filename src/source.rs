//! The user's selected file and how the pipeline classifies it.
//!
//! A [`SourceImage`] is immutable once created. Classification only looks at
//! the declared MIME type and the byte length:
//!
//! | Declared MIME | Kind |
//! |---|---|
//! | empty file, or not `image/*` | [`SourceKind::NotProcessable`] |
//! | `image/jpeg`, `image/png`, `image/webp`, `image/gif` | [`SourceKind::Eligible`] |
//! | any other `image/*` (HEIC, TIFF, SVG, ...) | [`SourceKind::Passthrough`] |

use crate::naming::split_extension;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

/// MIME type used when neither the caller nor content sniffing provides one.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Raster formats the pipeline is allowed to decode and re-encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl InputFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Not an image (or empty): shipped as-is without touching a decoder.
    NotProcessable,
    /// An image type outside the whitelist: never re-encoded.
    Passthrough,
    Eligible(InputFormat),
}

/// A user-selected file: bytes, declared MIME type and filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    filename: String,
    mime: String,
    bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(
        filename: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, sniffing its MIME type from the content.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = sniff_mime(&bytes, &filename);
        Ok(Self::new(filename, mime, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap clone of the shared byte buffer.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Original size in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn classify(&self) -> SourceKind {
        let is_image = self
            .mime
            .trim()
            .get(..6)
            .is_some_and(|p| p.eq_ignore_ascii_case("image/"));
        if self.is_empty() || !is_image {
            return SourceKind::NotProcessable;
        }
        match InputFormat::from_mime(&self.mime) {
            Some(format) => SourceKind::Eligible(format),
            None => SourceKind::Passthrough,
        }
    }

    /// Pixel dimensions from the header alone, without decoding pixels.
    ///
    /// `None` when the header cannot be parsed; callers fall through to a
    /// full decode, which reports the real error.
    pub fn probe_dimensions(&self) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(self.bytes()))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

/// Best-effort MIME type: magic bytes first, then the filename's extension.
///
/// A `.jpg` with damaged magic bytes stays `image/jpeg`, so it fails at decode
/// rather than passing as an opaque file.
pub fn sniff_mime(bytes: &[u8], filename: &str) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .or_else(|| mime_for_extension(filename))
        .unwrap_or(UNKNOWN_MIME)
        .to_string()
}

/// Declared type for a whitelisted image extension.
pub fn mime_for_extension(filename: &str) -> Option<&'static str> {
    let ext = split_extension(filename).1?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "jpe" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
