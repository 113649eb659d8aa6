//! Bounded (dimensions, quality) search for an encoding under the byte budget.
//!
//! ```text
//! render at fit_within(native, max_dimension), quality = format start
//! loop (at most max_attempts encodes):
//!     encode → size ≤ budget?  done
//!     quality > floor?          quality -= step (not below floor)
//!     longer edge > min_side?   longer edge *= shrink_ratio, re-render
//!     otherwise                 give up
//! ```
//!
//! Quality is not reset after a shrink: once the floor is reached every
//! remaining attempt trades pixels only. Each target is derived from the
//! native dimensions, so aspect ratio stays within one pixel of the source.
//!
//! The search holds no state between calls. Given the same surface, encoder,
//! budget and settings it performs the same sequence of encodes and returns
//! the same bytes.

use crate::imaging::calculations::{fit_within, next_longer_edge, scale_to_longer_edge};
use crate::imaging::{
    BackendError, Canvas, Dimensions, EncodeTarget, Encoder, OutputFormat, Quality, Surface,
};
use crate::types::CompressedResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Render failed: {0}")]
    Render(BackendError),
    #[error("Encode failed: {0}")]
    Encode(BackendError),
    #[error("No encoding under {budget} bytes after {attempts} attempts (smallest {smallest})")]
    CannotConverge {
        budget: u64,
        attempts: u32,
        smallest: u64,
    },
}

/// Knobs for [`converge`]. Defaults match `[search]` in the stock config.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub max_attempts: u32,
    pub quality_step: u32,
    pub floor_quality: Quality,
    pub shrink_ratio: f64,
    pub min_side: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            quality_step: 10,
            floor_quality: Quality::new(50),
            shrink_ratio: 0.85,
            min_side: 480,
        }
    }
}

/// One encode the search performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub target: EncodeTarget,
    pub size: u64,
}

#[derive(Debug)]
pub struct Convergence {
    pub result: CompressedResult,
    pub attempts: u32,
    /// Quality reductions plus dimension shrinks applied before success
    pub reductions: u32,
    /// Whether the first render was already smaller than native size
    pub resized: bool,
    pub trace: Vec<Attempt>,
}

/// Find the first encoding of `surface` that fits `budget`.
///
/// `canvas` is redrawn in place whenever the target dimensions change.
pub fn converge(
    surface: &dyn Surface,
    canvas: &mut Canvas,
    encoder: &dyn Encoder,
    format: OutputFormat,
    budget: u64,
    max_dimension: u32,
    settings: &SearchSettings,
) -> Result<Convergence, SearchError> {
    let native = surface.dimensions();
    let mut dims = Dimensions::from(fit_within(native.as_tuple(), max_dimension));
    let resized = dims != native;
    let mut quality = format.initial_quality();
    let floor = settings.floor_quality.min(quality);

    surface
        .draw(canvas, dims.width, dims.height)
        .map_err(SearchError::Render)?;

    let mut trace = Vec::new();
    let mut reductions = 0;
    let mut smallest = u64::MAX;

    loop {
        let target = EncodeTarget::new(dims.width, dims.height, quality);
        let result = CompressedResult {
            bytes: encoder
                .encode(canvas, format, quality)
                .map_err(SearchError::Encode)?,
            target,
        };
        // An empty payload would fit any budget.
        if result.is_empty() {
            return Err(SearchError::Encode(BackendError::ProcessingFailed(format!(
                "{} encoder produced no bytes",
                encoder.name()
            ))));
        }
        let size = result.len();
        trace.push(Attempt { target, size });
        log::debug!(
            "attempt {}: {}x{} q{} → {} bytes (budget {})",
            trace.len(),
            dims.width,
            dims.height,
            quality.value(),
            size,
            budget
        );

        if size <= budget {
            return Ok(Convergence {
                result,
                attempts: trace.len() as u32,
                reductions,
                resized,
                trace,
            });
        }
        smallest = smallest.min(size);

        if trace.len() as u32 >= settings.max_attempts {
            break;
        }

        if quality > floor {
            quality = quality.reduced(settings.quality_step, floor);
        } else if let Some(longer) =
            next_longer_edge(dims.longer_edge(), settings.shrink_ratio, settings.min_side)
        {
            dims = scale_to_longer_edge(native.as_tuple(), longer).into();
            surface
                .draw(canvas, dims.width, dims.height)
                .map_err(SearchError::Render)?;
        } else {
            break;
        }
        reductions += 1;
    }

    Err(SearchError::CannotConverge {
        budget,
        attempts: trace.len() as u32,
        smallest,
    })
}
