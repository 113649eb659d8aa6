//! One pipeline run: classify → decode → converge → outcome.
//!
//! [`Preparer::prepare`] never returns an error. Every failure becomes
//! [`PreparationOutcome::Failed`], and the decoded surface is released exactly
//! once whichever way the run ends.
//!
//! ## Decision table
//!
//! | Input | Outcome |
//! |---|---|
//! | not an image, or empty | `Unchanged`, no decoder involved |
//! | image outside the whitelist, ≤ budget | `Unchanged` |
//! | image outside the whitelist, > budget | `OversizedAllowed` |
//! | whitelisted, ≤ budget and ≤ max dimension | `Unchanged`, header read only |
//! | whitelisted, decode fails | `Failed(Decode)` |
//! | whitelisted, search succeeds | `Compressed` |
//! | whitelisted, search exhausts its attempts | `Failed(CannotConverge)` |

use crate::imaging::{BackendError, Canvas, OutputFormat, SurfaceHandle, Toolkit};
use crate::naming::normalized_filename;
use crate::search::{Convergence, SearchError, SearchSettings, converge};
use crate::source::{SourceImage, SourceKind};
use crate::types::{PreparationOutcome, PrepareError, PreparedFile};

/// Default byte budget: 3 MiB.
pub const DEFAULT_BUDGET_BYTES: u64 = 3 * 1024 * 1024;
pub const DEFAULT_MAX_DIMENSION: u32 = 1600;

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareSettings {
    pub budget_bytes: u64,
    pub max_dimension: u32,
    pub format: OutputFormat,
    pub search: SearchSettings,
    /// Submit the original bytes when the very first encode already fit
    /// without any resize or reduction, and the original itself fits.
    pub keep_unreduced_original: bool,
}

impl Default for PrepareSettings {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            format: OutputFormat::default(),
            search: SearchSettings::default(),
            keep_unreduced_original: true,
        }
    }
}

pub struct Preparer {
    toolkit: Toolkit,
    settings: PrepareSettings,
}

impl Preparer {
    pub fn new(toolkit: Toolkit, settings: PrepareSettings) -> Self {
        Self { toolkit, settings }
    }

    pub fn settings(&self) -> &PrepareSettings {
        &self.settings
    }

    pub fn budget(&self) -> u64 {
        self.settings.budget_bytes
    }

    pub fn prepare(&self, source: &SourceImage) -> PreparationOutcome {
        let outcome = self.run(source);
        match &outcome {
            PreparationOutcome::Failed(e) => log::info!("{}: failed: {e}", source.filename()),
            other => log::info!(
                "{}: {} ({} → {} bytes)",
                source.filename(),
                other.label(),
                source.len(),
                other.effective_size().unwrap_or_default()
            ),
        }
        outcome
    }

    fn run(&self, source: &SourceImage) -> PreparationOutcome {
        let budget = self.settings.budget_bytes;

        match source.classify() {
            SourceKind::NotProcessable => return PreparationOutcome::Unchanged(source.clone()),
            SourceKind::Passthrough if source.len() <= budget => {
                return PreparationOutcome::Unchanged(source.clone());
            }
            SourceKind::Passthrough => return PreparationOutcome::OversizedAllowed(source.clone()),
            SourceKind::Eligible(_) => {}
        }

        if self.within_limits(source) {
            return PreparationOutcome::Unchanged(source.clone());
        }

        let decoder = self.toolkit.decoder();
        let handle = match decoder.decode(source) {
            Ok(surface) => SurfaceHandle::new(surface, decoder.name()),
            Err(e) => return PreparationOutcome::Failed(PrepareError::Decode(e)),
        };

        let searched = self.search(&handle);
        handle.release();

        match searched {
            Ok(conv) => self.finish(source, conv),
            Err(SearchError::Render(e)) | Err(SearchError::Encode(e)) => {
                PreparationOutcome::Failed(PrepareError::Encode(e))
            }
            Err(SearchError::CannotConverge {
                budget,
                attempts,
                smallest,
            }) => PreparationOutcome::Failed(PrepareError::CannotConverge {
                budget,
                attempts,
                smallest,
            }),
        }
    }

    /// Size and header dimensions already satisfy both limits.
    fn within_limits(&self, source: &SourceImage) -> bool {
        source.len() <= self.settings.budget_bytes
            && source
                .probe_dimensions()
                .is_some_and(|(w, h)| w.max(h) <= self.settings.max_dimension)
    }

    fn search(&self, handle: &SurfaceHandle) -> Result<Convergence, SearchError> {
        let surface = handle.surface().ok_or_else(|| {
            SearchError::Render(BackendError::ProcessingFailed(
                "Surface released before rendering".into(),
            ))
        })?;
        let mut canvas = Canvas::new();
        converge(
            surface,
            &mut canvas,
            self.toolkit.encoder(),
            self.settings.format,
            self.settings.budget_bytes,
            self.settings.max_dimension,
            &self.settings.search,
        )
    }

    fn finish(&self, source: &SourceImage, conv: Convergence) -> PreparationOutcome {
        let untouched = conv.attempts == 1 && conv.reductions == 0 && !conv.resized;
        if self.settings.keep_unreduced_original
            && untouched
            && source.len() <= self.settings.budget_bytes
        {
            return PreparationOutcome::Unchanged(source.clone());
        }

        let final_size = conv.result.len();
        PreparationOutcome::Compressed {
            file: PreparedFile {
                filename: normalized_filename(source.filename(), self.settings.format),
                mime: self.settings.format.mime_type().to_string(),
                bytes: conv.result.bytes.into(),
                target: conv.result.target,
                attempts: conv.attempts,
            },
            original_size: source.len(),
            final_size,
        }
    }
}
