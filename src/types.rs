//! Result types shared by the pipeline, the submission adapter and the CLI.

use crate::imaging::{BackendError, EncodeTarget};
use crate::output::format_bytes;
use crate::source::SourceImage;
use std::sync::Arc;
use thiserror::Error;

/// Encoded bytes plus the target that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedResult {
    pub bytes: Vec<u8>,
    pub target: EncodeTarget,
}

impl CompressedResult {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A re-encoded file ready to replace the original in a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFile {
    /// Original base name with the output format's extension
    pub filename: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
    pub target: EncodeTarget,
    /// Encode attempts the search needed
    pub attempts: u32,
}

impl PreparedFile {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why a pipeline run produced nothing usable.
#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Cannot decode image: {0}")]
    Decode(BackendError),
    #[error("Cannot encode image: {0}")]
    Encode(BackendError),
    #[error(
        "Could not shrink under {budget} bytes in {attempts} attempts (smallest was {smallest} bytes)"
    )]
    CannotConverge {
        budget: u64,
        attempts: u32,
        smallest: u64,
    },
}

impl PrepareError {
    /// Corrective message shown to the person who picked the file.
    ///
    /// Encode failures read the same as convergence failures: either way the
    /// image could not be brought under the budget.
    pub fn user_message(&self, budget: u64) -> String {
        match self {
            PrepareError::Decode(_) => {
                "Cannot process this image. Please choose another.".to_string()
            }
            PrepareError::Encode(_) | PrepareError::CannotConverge { .. } => format!(
                "Could not shrink this image under {}. Please choose a smaller image.",
                format_bytes(budget)
            ),
        }
    }
}

/// What one pipeline run decided for a selected file.
#[derive(Debug)]
pub enum PreparationOutcome {
    /// Already within limits (or not an image): submit the original.
    Unchanged(SourceImage),
    Compressed {
        file: PreparedFile,
        original_size: u64,
        final_size: u64,
    },
    /// Not re-encodable; submit the original even though it exceeds the budget.
    OversizedAllowed(SourceImage),
    Failed(PrepareError),
}

impl PreparationOutcome {
    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            PreparationOutcome::Unchanged(_) => "unchanged",
            PreparationOutcome::Compressed { .. } => "compressed",
            PreparationOutcome::OversizedAllowed(_) => "oversized",
            PreparationOutcome::Failed(_) => "failed",
        }
    }

    /// Byte length of the file that would be submitted, if any.
    pub fn effective_size(&self) -> Option<u64> {
        match self {
            PreparationOutcome::Unchanged(src) | PreparationOutcome::OversizedAllowed(src) => {
                Some(src.len())
            }
            PreparationOutcome::Compressed { final_size, .. } => Some(*final_size),
            PreparationOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PreparationOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Quality;

    const BUDGET: u64 = 3 * 1024 * 1024;

    #[test]
    fn converge_message_names_budget() {
        let err = PrepareError::CannotConverge {
            budget: BUDGET,
            attempts: 10,
            smallest: 4_000_000,
        };
        assert!(
            err.user_message(BUDGET)
                .starts_with("Could not shrink this image under 3 MB")
        );
    }

    #[test]
    fn encode_failure_reads_like_convergence_failure() {
        let err = PrepareError::Encode(BackendError::ProcessingFailed("boom".into()));
        assert!(err.user_message(BUDGET).contains("Could not shrink"));
    }

    #[test]
    fn decode_message_is_generic() {
        let err = PrepareError::Decode(BackendError::ProcessingFailed("bad header".into()));
        assert_eq!(
            err.user_message(BUDGET),
            "Cannot process this image. Please choose another."
        );
    }

    #[test]
    fn outcome_effective_size() {
        let src = SourceImage::new("a.png", "image/png", vec![0u8; 42]);
        assert_eq!(PreparationOutcome::Unchanged(src).effective_size(), Some(42));

        let file = PreparedFile {
            filename: "a.jpg".into(),
            mime: "image/jpeg".into(),
            bytes: vec![0u8; 7].into(),
            target: EncodeTarget::new(10, 10, Quality::new(80)),
            attempts: 1,
        };
        let outcome = PreparationOutcome::Compressed {
            final_size: file.len(),
            file,
            original_size: 100,
        };
        assert_eq!(outcome.effective_size(), Some(7));
        assert_eq!(outcome.label(), "compressed");

        let failed = PreparationOutcome::Failed(PrepareError::CannotConverge {
            budget: 1,
            attempts: 1,
            smallest: 2,
        });
        assert_eq!(failed.effective_size(), None);
        assert!(failed.is_failed());
    }
}
