//! Submission adapter: the single owner of selection, token and preview state.
//!
//! ## Lifecycle
//!
//! ```text
//!            select(src) → token
//!   Idle ──────────────────────────► Processing(token)
//!    ▲                                   │ complete(token, outcome)
//!    │  Failed: clear selection,         ├──► Ready(Unchanged)
//!    │  set corrective message           ├──► Ready(Compressed)
//!    └───────────────────────────────────┤
//!                                        └──► Ready(OversizedAllowed)
//! ```
//!
//! Every [`select`](SubmissionAdapter::select) and
//! [`reset`](SubmissionAdapter::reset) bumps the token counter. A completion
//! carrying any other token is discarded, errors included, so the visible
//! state always belongs to the latest selection.
//!
//! ## Substitution
//!
//! The outgoing submission holds its file in a [`FileSlot`]. Some slots cannot
//! take a replacement file ([`LockedSlot`]); the adapter then falls back:
//!
//! | Original size | Result |
//! |---|---|
//! | over budget | `Ready(OversizedAllowed)`, original submitted |
//! | within budget | `Ready(Unchanged)`, original submitted, compressed bytes previewed |

use crate::output::format_bytes;
use crate::preview::{Preview, PreviewRegistry};
use crate::source::SourceImage;
use crate::types::{PreparationOutcome, PreparedFile};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubstitutionError {
    #[error("This submission cannot replace its file")]
    Unsupported,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("The image is still being prepared")]
    Busy,
    #[error("No image selected")]
    NoImage,
    #[error("The image is {size} bytes, over the {budget} byte limit")]
    OverBudget { size: u64, budget: u64 },
}

/// Identifies one selection. Later selections carry larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessingToken(u64);

impl ProcessingToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyKind {
    Unchanged,
    Compressed,
    OversizedAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Idle,
    Processing(ProcessingToken),
    Ready(ReadyKind),
}

/// Whether a completion was applied or discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// A file as it travels in the outgoing submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl SubmittedFile {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&SourceImage> for SubmittedFile {
    fn from(src: &SourceImage) -> Self {
        Self {
            filename: src.filename().to_string(),
            mime: src.mime().to_string(),
            bytes: src.shared_bytes(),
        }
    }
}

impl From<&PreparedFile> for SubmittedFile {
    fn from(file: &PreparedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            mime: file.mime.clone(),
            bytes: Arc::clone(&file.bytes),
        }
    }
}

/// The file field of the outgoing submission.
pub trait FileSlot {
    /// Store the user's own selection. Always possible.
    fn select(&mut self, file: SubmittedFile);

    /// Replace the selection with a prepared file.
    fn substitute(&mut self, file: SubmittedFile) -> Result<(), SubstitutionError>;

    fn clear(&mut self);

    fn file(&self) -> Option<&SubmittedFile>;
}

/// A slot that accepts substitutions.
#[derive(Debug, Default)]
pub struct InMemorySlot {
    file: Option<SubmittedFile>,
}

impl FileSlot for InMemorySlot {
    fn select(&mut self, file: SubmittedFile) {
        self.file = Some(file);
    }

    fn substitute(&mut self, file: SubmittedFile) -> Result<(), SubstitutionError> {
        self.file = Some(file);
        Ok(())
    }

    fn clear(&mut self) {
        self.file = None;
    }

    fn file(&self) -> Option<&SubmittedFile> {
        self.file.as_ref()
    }
}

/// A slot that only ever holds what the user selected.
#[derive(Debug, Default)]
pub struct LockedSlot {
    file: Option<SubmittedFile>,
}

impl FileSlot for LockedSlot {
    fn select(&mut self, file: SubmittedFile) {
        self.file = Some(file);
    }

    fn substitute(&mut self, _file: SubmittedFile) -> Result<(), SubstitutionError> {
        Err(SubstitutionError::Unsupported)
    }

    fn clear(&mut self) {
        self.file = None;
    }

    fn file(&self) -> Option<&SubmittedFile> {
        self.file.as_ref()
    }
}

/// What the gate lets through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub field_name: String,
    pub file: SubmittedFile,
    /// True when `file` is the prepared replacement, not the original
    pub substituted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sizes {
    original: u64,
    effective: u64,
}

pub struct SubmissionAdapter<S: FileSlot> {
    slot: S,
    field_name: String,
    budget: u64,
    last_token: u64,
    state: AdapterState,
    substituted: bool,
    sizes: Option<Sizes>,
    preview: PreviewRegistry,
    message: Option<String>,
}

impl<S: FileSlot> SubmissionAdapter<S> {
    pub fn new(slot: S, field_name: impl Into<String>, budget: u64) -> Self {
        Self {
            slot,
            field_name: field_name.into(),
            budget,
            last_token: 0,
            state: AdapterState::Idle,
            substituted: false,
            sizes: None,
            preview: PreviewRegistry::new(),
            message: None,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Corrective message from the last failed run, until the next selection.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.current()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.preview
    }

    /// Whether `token` still belongs to the latest selection.
    pub fn is_current(&self, token: ProcessingToken) -> bool {
        self.state == AdapterState::Processing(token)
    }

    /// A new file was picked. Any in-flight run becomes stale.
    pub fn select(&mut self, source: &SourceImage) -> ProcessingToken {
        let token = self.next_token();
        self.slot.select(SubmittedFile::from(source));
        self.preview.revoke();
        self.substituted = false;
        self.sizes = None;
        self.message = None;
        self.state = AdapterState::Processing(token);
        log::debug!("selected {} as token {}", source.filename(), token.0);
        token
    }

    /// Apply the outcome of the run started for `token`.
    pub fn complete(&mut self, token: ProcessingToken, outcome: PreparationOutcome) -> Completion {
        if !self.is_current(token) {
            match &outcome {
                PreparationOutcome::Failed(e) => {
                    log::debug!("discarding stale failure for token {}: {e}", token.0)
                }
                other => log::debug!("discarding stale {} for token {}", other.label(), token.0),
            }
            return Completion::Stale;
        }

        match outcome {
            PreparationOutcome::Unchanged(src) => {
                self.show_original(&src, ReadyKind::Unchanged);
            }
            PreparationOutcome::OversizedAllowed(src) => {
                self.show_original(&src, ReadyKind::OversizedAllowed);
            }
            PreparationOutcome::Compressed {
                file,
                original_size,
                final_size,
            } => self.apply_compressed(&file, original_size, final_size),
            PreparationOutcome::Failed(err) => {
                self.clear_selection();
                self.message = Some(err.user_message(self.budget));
                log::info!("selection cleared: {err}");
            }
        }
        Completion::Applied
    }

    /// Form reset: forget everything and invalidate in-flight runs.
    pub fn reset(&mut self) {
        self.next_token();
        self.clear_selection();
        self.message = None;
    }

    /// Check whether the submission may go out, and with which file.
    pub fn gate(&self) -> Result<Submission, GateError> {
        let kind = match self.state {
            AdapterState::Processing(_) => return Err(GateError::Busy),
            AdapterState::Idle => return Err(GateError::NoImage),
            AdapterState::Ready(kind) => kind,
        };
        let file = self.slot.file().ok_or(GateError::NoImage)?;
        if file.len() > self.budget && !self.substituted && kind != ReadyKind::OversizedAllowed {
            return Err(GateError::OverBudget {
                size: file.len(),
                budget: self.budget,
            });
        }
        Ok(Submission {
            field_name: self.field_name.clone(),
            file: file.clone(),
            substituted: self.substituted,
        })
    }

    /// Human-readable size line, e.g. `12 MB → 2.9 MB`.
    pub fn size_feedback(&self) -> Option<String> {
        let sizes = self.sizes?;
        let line = match self.state {
            AdapterState::Ready(ReadyKind::Compressed) => format!(
                "{} → {}",
                format_bytes(sizes.original),
                format_bytes(sizes.effective)
            ),
            AdapterState::Ready(ReadyKind::OversizedAllowed) => format!(
                "{} (over the {} limit, sent as-is)",
                format_bytes(sizes.effective),
                format_bytes(self.budget)
            ),
            AdapterState::Ready(ReadyKind::Unchanged) => format_bytes(sizes.effective),
            _ => return None,
        };
        Some(line)
    }

    fn next_token(&mut self) -> ProcessingToken {
        self.last_token += 1;
        ProcessingToken(self.last_token)
    }

    fn clear_selection(&mut self) {
        self.slot.clear();
        self.preview.revoke();
        self.substituted = false;
        self.sizes = None;
        self.state = AdapterState::Idle;
    }

    fn show_original(&mut self, src: &SourceImage, kind: ReadyKind) {
        self.preview.show(src.shared_bytes(), src.mime());
        self.sizes = Some(Sizes {
            original: src.len(),
            effective: src.len(),
        });
        self.state = AdapterState::Ready(kind);
    }

    fn apply_compressed(&mut self, file: &PreparedFile, original_size: u64, final_size: u64) {
        match self.slot.substitute(SubmittedFile::from(file)) {
            Ok(()) => {
                self.preview.show(Arc::clone(&file.bytes), &file.mime);
                self.substituted = true;
                self.sizes = Some(Sizes {
                    original: original_size,
                    effective: final_size,
                });
                self.state = AdapterState::Ready(ReadyKind::Compressed);
            }
            Err(e) => {
                log::warn!("{}: {e}", file.filename);
                let original = self.slot.file().map(SubmittedFile::len).unwrap_or(original_size);
                if original_size > self.budget {
                    if let Some(orig) = self.slot.file() {
                        self.preview.show(Arc::clone(&orig.bytes), &orig.mime);
                    }
                    self.state = AdapterState::Ready(ReadyKind::OversizedAllowed);
                } else {
                    self.preview.show(Arc::clone(&file.bytes), &file.mime);
                    self.state = AdapterState::Ready(ReadyKind::Unchanged);
                }
                self.sizes = Some(Sizes {
                    original,
                    effective: original,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockDecoder, MockEncoder};
    use crate::imaging::{BackendError, EncodeTarget, Quality, Toolkit};
    use crate::prepare::{PrepareSettings, Preparer};
    use crate::types::PrepareError;
    use std::sync::{Mutex, mpsc};
    use std::thread;

    const BUDGET: u64 = 1_000;

    fn adapter() -> SubmissionAdapter<InMemorySlot> {
        SubmissionAdapter::new(InMemorySlot::default(), "image", BUDGET)
    }

    fn source(name: &str, len: usize) -> SourceImage {
        SourceImage::new(name, "image/jpeg", vec![1u8; len])
    }

    fn compressed(name: &str, original: u64, len: usize) -> PreparationOutcome {
        let file = PreparedFile {
            filename: name.to_string(),
            mime: "image/jpeg".into(),
            bytes: vec![2u8; len].into(),
            target: EncodeTarget::new(100, 100, Quality::new(70)),
            attempts: 3,
        };
        PreparationOutcome::Compressed {
            file,
            original_size: original,
            final_size: len as u64,
        }
    }

    fn cannot_converge() -> PreparationOutcome {
        PreparationOutcome::Failed(PrepareError::CannotConverge {
            budget: BUDGET,
            attempts: 10,
            smallest: 4_000,
        })
    }

    // =========================================================================
    // State machine
    // =========================================================================

    #[test]
    fn starts_idle_and_gate_rejects() {
        let a = adapter();
        assert_eq!(a.state(), AdapterState::Idle);
        assert_eq!(a.gate(), Err(GateError::NoImage));
    }

    #[test]
    fn select_enters_processing_and_blocks_gate() {
        let mut a = adapter();
        let token = a.select(&source("a.jpg", 10));
        assert_eq!(a.state(), AdapterState::Processing(token));
        assert_eq!(a.gate(), Err(GateError::Busy));
    }

    #[test]
    fn unchanged_submits_original() {
        let mut a = adapter();
        let src = source("a.jpg", 10);
        let token = a.select(&src);
        assert_eq!(
            a.complete(token, PreparationOutcome::Unchanged(src.clone())),
            Completion::Applied
        );

        let sub = a.gate().unwrap();
        assert_eq!(sub.field_name, "image");
        assert_eq!(sub.file, SubmittedFile::from(&src));
        assert!(!sub.substituted);
        assert_eq!(a.size_feedback().as_deref(), Some("10 B"));
    }

    #[test]
    fn compressed_substitutes_file() {
        let mut a = adapter();
        let token = a.select(&source("big.png", 5_000));
        a.complete(token, compressed("big.jpg", 5_000, 800));

        assert_eq!(a.state(), AdapterState::Ready(ReadyKind::Compressed));
        let sub = a.gate().unwrap();
        assert!(sub.substituted);
        assert_eq!(sub.file.filename, "big.jpg");
        assert_eq!(sub.file.len(), 800);
        assert_eq!(a.size_feedback().as_deref(), Some("4.9 KB → 800 B"));
    }

    #[test]
    fn failure_clears_selection_with_message() {
        let mut a = adapter();
        let token = a.select(&source("huge.jpg", 5_000));
        a.complete(token, cannot_converge());

        assert_eq!(a.state(), AdapterState::Idle);
        assert!(a.slot().file().is_none());
        assert!(a.preview().is_none());
        assert!(a.message().unwrap().starts_with("Could not shrink"));
        assert_eq!(a.gate(), Err(GateError::NoImage));
    }

    #[test]
    fn decode_failure_uses_generic_message() {
        let mut a = adapter();
        let token = a.select(&source("bad.jpg", 50));
        a.complete(
            token,
            PreparationOutcome::Failed(PrepareError::Decode(BackendError::ProcessingFailed(
                "truncated".into(),
            ))),
        );
        assert_eq!(
            a.message(),
            Some("Cannot process this image. Please choose another.")
        );
    }

    #[test]
    fn new_selection_clears_message() {
        let mut a = adapter();
        let token = a.select(&source("huge.jpg", 5_000));
        a.complete(token, cannot_converge());
        a.select(&source("ok.jpg", 10));
        assert!(a.message().is_none());
    }

    #[test]
    fn oversized_allowed_passes_gate() {
        let mut a = adapter();
        let src = SourceImage::new("raw.heic", "image/heic", vec![0u8; 5_000]);
        let token = a.select(&src);
        a.complete(token, PreparationOutcome::OversizedAllowed(src));

        let sub = a.gate().unwrap();
        assert_eq!(sub.file.len(), 5_000);
        assert!(a.size_feedback().unwrap().contains("sent as-is"));
    }

    #[test]
    fn unchanged_over_budget_is_blocked() {
        let mut a = adapter();
        let src = SourceImage::new("big.pdf", "application/pdf", vec![0u8; 5_000]);
        let token = a.select(&src);
        a.complete(token, PreparationOutcome::Unchanged(src));
        assert_eq!(
            a.gate(),
            Err(GateError::OverBudget {
                size: 5_000,
                budget: BUDGET
            })
        );
    }

    #[test]
    fn reset_returns_to_idle_and_invalidates_token() {
        let mut a = adapter();
        let src = source("a.jpg", 10);
        let token = a.select(&src);
        a.reset();
        assert_eq!(a.state(), AdapterState::Idle);
        assert_eq!(
            a.complete(token, PreparationOutcome::Unchanged(src)),
            Completion::Stale
        );
        assert!(a.slot().file().is_none());
    }

    // =========================================================================
    // Substitution unsupported
    // =========================================================================

    #[test]
    fn locked_slot_over_budget_falls_back_to_oversized() {
        let mut a = SubmissionAdapter::new(LockedSlot::default(), "image", BUDGET);
        let token = a.select(&source("big.jpg", 5_000));
        a.complete(token, compressed("big.jpg", 5_000, 800));

        assert_eq!(a.state(), AdapterState::Ready(ReadyKind::OversizedAllowed));
        let sub = a.gate().unwrap();
        assert!(!sub.substituted);
        assert_eq!(sub.file.len(), 5_000);
    }

    #[test]
    fn locked_slot_within_budget_previews_compressed_only() {
        let mut a = SubmissionAdapter::new(LockedSlot::default(), "image", BUDGET);
        let token = a.select(&source("a.png", 900));
        a.complete(token, compressed("a.jpg", 900, 300));

        assert_eq!(a.state(), AdapterState::Ready(ReadyKind::Unchanged));
        assert_eq!(a.preview().map(|p| p.bytes.len()), Some(300));
        let sub = a.gate().unwrap();
        assert_eq!(sub.file.len(), 900);
        assert!(!sub.substituted);
    }

    // =========================================================================
    // Staleness and previews
    // =========================================================================

    #[test]
    fn stale_result_is_discarded() {
        let mut a = adapter();
        let first = a.select(&source("a.jpg", 5_000));
        let second_src = source("b.jpg", 10);
        let second = a.select(&second_src);

        assert_eq!(a.complete(first, compressed("a.jpg", 5_000, 900)), Completion::Stale);
        assert_eq!(a.state(), AdapterState::Processing(second));

        a.complete(second, PreparationOutcome::Unchanged(second_src.clone()));
        assert_eq!(a.gate().unwrap().file, SubmittedFile::from(&second_src));
    }

    #[test]
    fn stale_failure_does_not_clear_current_selection() {
        let mut a = adapter();
        let first = a.select(&source("a.jpg", 5_000));
        let src = source("b.jpg", 10);
        let second = a.select(&src);
        a.complete(second, PreparationOutcome::Unchanged(src));

        assert_eq!(a.complete(first, cannot_converge()), Completion::Stale);
        assert!(a.message().is_none());
        assert!(a.gate().is_ok());
    }

    #[test]
    fn duplicate_completion_is_stale() {
        let mut a = adapter();
        let src = source("a.jpg", 10);
        let token = a.select(&src);
        a.complete(token, PreparationOutcome::Unchanged(src.clone()));
        assert_eq!(
            a.complete(token, PreparationOutcome::Unchanged(src)),
            Completion::Stale
        );
    }

    #[test]
    fn at_most_one_preview_is_live() {
        let mut a = adapter();
        for i in 0..5 {
            let src = source(&format!("{i}.jpg"), 10 + i);
            let token = a.select(&src);
            a.complete(token, PreparationOutcome::Unchanged(src));
            assert_eq!(a.previews().live_count(), 1);
        }
        a.reset();
        assert_eq!(a.previews().live_count(), 0);
    }

    #[test]
    fn tokens_increase_monotonically() {
        let mut a = adapter();
        let t1 = a.select(&source("a.jpg", 1));
        a.reset();
        let t2 = a.select(&source("b.jpg", 1));
        assert!(t2 > t1);
        assert_eq!(t2.value(), t1.value() + 2);
    }

    #[test]
    fn slow_run_finishing_last_never_wins() {
        let adapter = Arc::new(Mutex::new(adapter()));
        let preparer = Arc::new(Preparer::new(
            Toolkit::new(
                Box::new(MockDecoder::with_dimensions(4000, 3000)),
                Box::new(MockEncoder::new(100_000)),
            ),
            PrepareSettings {
                budget_bytes: BUDGET,
                ..PrepareSettings::default()
            },
        ));

        let slow_src = source("slow.jpg", 5_000);
        let slow_token = adapter.lock().unwrap().select(&slow_src);

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let slow = {
            let adapter = Arc::clone(&adapter);
            let preparer = Arc::clone(&preparer);
            thread::spawn(move || {
                let outcome = preparer.prepare(&slow_src);
                release_rx.recv().unwrap();
                adapter.lock().unwrap().complete(slow_token, outcome)
            })
        };

        let fast_src = source("fast.jpg", 10);
        let fast_token = adapter.lock().unwrap().select(&fast_src);
        let outcome = preparer.prepare(&fast_src);
        assert_eq!(
            adapter.lock().unwrap().complete(fast_token, outcome),
            Completion::Applied
        );

        release_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), Completion::Stale);

        let guard = adapter.lock().unwrap();
        assert_eq!(guard.gate().unwrap().file.filename, "fast.jpg");
    }
}
