//! Parameter types for encode operations.
//!
//! These types describe *what* to produce, not *how*. They sit between the
//! [`search`](crate::search) (which decides the next target) and the
//! [`backend`](super::backend) encoders (which do the actual byte work).
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100). Clamped on construction.
//! - [`OutputFormat`]: the single lossy format every eligible input is
//!   normalized to, with its starting quality, extension and MIME type.
//! - [`EncodeTarget`]: the `(width, height, quality)` triple one search
//!   iteration encodes at.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quality(pub u32);

impl Quality {
    pub const MIN: Quality = Quality(1);
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN.0, Self::MAX.0))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Step down by `step`, never below `floor`.
    pub fn reduced(self, step: u32, floor: Quality) -> Quality {
        Quality::new(self.0.saturating_sub(step).max(floor.0))
    }
}

impl Default for Quality {
    fn default() -> Self {
        OutputFormat::default().initial_quality()
    }
}

/// The lossy format all re-encoded uploads are normalized to.
///
/// A single output format keeps the convergence search on one quality axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Avif,
}

impl OutputFormat {
    /// Quality the first search attempt encodes at.
    ///
    /// AVIF output grows quickly near the top of its quality range, so it
    /// starts lower than JPEG.
    pub fn initial_quality(self) -> Quality {
        match self {
            OutputFormat::Jpeg => Quality(90),
            OutputFormat::Avif => Quality(80),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("jpeg"),
            OutputFormat::Avif => f.write_str("avif"),
        }
    }
}

/// One point in the (dimensions, quality) search space.
///
/// Invariant: `width` and `height` are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeTarget {
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

impl EncodeTarget {
    pub fn new(width: u32, height: u32, quality: Quality) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            quality,
        }
    }
}
