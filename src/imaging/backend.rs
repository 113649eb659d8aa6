//! Codec traits and shared types.
//!
//! The pipeline talks to pixels through three traits:
//!
//! | Trait | Role |
//! |---|---|
//! | [`Surface`] | a decoded image that can paint itself into a [`Canvas`] at any size |
//! | [`Decoder`] | [`SourceImage`] → boxed [`Surface`] |
//! | [`Encoder`] | [`Canvas`] + format + quality → compressed bytes |
//!
//! Two concrete families exist: [`native`](super::native) (fast path) and
//! [`compat`](super::compat) (data-URL / base64 path). Which one runs is
//! decided once at startup by [`Toolkit::probe`](super::toolkit::Toolkit::probe),
//! so call sites never branch on codec availability.

use super::canvas::Canvas;
use super::params::{OutputFormat, Quality};
use crate::source::SourceImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),
}

/// Pixel dimensions of a decoded surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn longer_edge(self) -> u32 {
        self.width.max(self.height)
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A decoded image, ready to be drawn at an arbitrary output size.
pub trait Surface: Send {
    fn dimensions(&self) -> Dimensions;

    /// Paint into `canvas`, resizing the canvas to exactly `width`×`height`.
    fn draw(&self, canvas: &mut Canvas, width: u32, height: u32) -> Result<(), BackendError>;
}

/// Turns source bytes into a [`Surface`].
pub trait Decoder: Send + Sync {
    /// Short label for logs and reports (`"native"`, `"compat"`).
    fn name(&self) -> &'static str;

    fn decode(&self, source: &SourceImage) -> Result<Box<dyn Surface>, BackendError>;
}

/// Serializes the current canvas contents.
///
/// Implementations must be deterministic: the same canvas, format and
/// quality always yield the same bytes.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(
        &self,
        canvas: &Canvas,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}

/// Owning wrapper that releases a decoded surface exactly once.
///
/// [`release`](Self::release) is the explicit, logged path. If a handle is
/// dropped without it (an early `?` return), `Drop` performs the same release,
/// so every exit path frees the decoded pixels exactly once.
pub struct SurfaceHandle {
    surface: Option<Box<dyn Surface>>,
    origin: &'static str,
}

impl SurfaceHandle {
    pub fn new(surface: Box<dyn Surface>, origin: &'static str) -> Self {
        Self {
            surface: Some(surface),
            origin,
        }
    }

    pub fn origin(&self) -> &'static str {
        self.origin
    }

    /// Borrow the surface. `None` only after release.
    pub fn surface(&self) -> Option<&dyn Surface> {
        self.surface.as_deref()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(surface) = self.surface.take() {
            let dims = surface.dimensions();
            drop(surface);
            log::trace!(
                "released {} surface {}x{}",
                self.origin,
                dims.width,
                dims.height
            );
        }
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}
