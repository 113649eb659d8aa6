//! # upload-prep
//!
//! Prepares a user-selected image for upload under two hard limits: a byte
//! budget and a maximum pixel dimension. Oversized images are decoded,
//! downscaled and re-encoded until they fit. Everything else goes through
//! untouched.
//!
//! # Architecture: Pipeline + Adapter
//!
//! ```text
//! SourceImage ─► Decoder ─► Canvas (target dims) ─► Encoder (quality) ─► size ≤ budget?
//!                               ▲                                            │ no
//!                               └──────── convergence search ◄───────────────┘
//!
//! PreparationOutcome ─► SubmissionAdapter ─► gate ─► outgoing payload
//! ```
//!
//! A pipeline run ([`prepare::Preparer::prepare`]) is synchronous, stateless
//! and never fails: every error becomes a [`types::PreparationOutcome`]. The
//! [`submission::SubmissionAdapter`] owns everything stateful: the current
//! selection, the processing token, the single live preview and the
//! submission gate.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | The selected file, MIME classification, input-format whitelist |
//! | [`imaging`] | Decoders, canvas renderer, encoders, startup capability probe |
//! | [`search`] | Bounded (dimensions, quality) convergence search |
//! | [`prepare`] | One pipeline run, from source to outcome |
//! | [`types`] | Outcomes, prepared files and pipeline errors |
//! | [`naming`] | Output filename normalization |
//! | [`preview`] | Single-live preview URI registry |
//! | [`submission`] | Token-guarded state machine, substitution and gate |
//! | [`process`] | Batch driver behind the CLI (walk, parallel prepare, write) |
//! | [`config`] | Layered TOML config with environment overrides |
//! | [`output`] | CLI output formatting and human-readable sizes |
//!
//! # Design Decisions
//!
//! ## Capabilities Are Probed Once
//!
//! Decoder and encoder each come in a fast native variant and a slower
//! compatibility variant (data URL in, base64 text out). Which one runs is
//! decided when the [`imaging::Toolkit`] is built. Downstream code holds trait
//! objects and never branches on availability again.
//!
//! ## Budget Correctness Over Fidelity
//!
//! The search stops at the first encoding that fits, trading quality first and
//! pixels second. If it cannot fit, the selection is cleared with a specific
//! message; an oversized file is never submitted silently. An over-budget file
//! passes the gate only as `OversizedAllowed`: an image type that cannot be
//! re-encoded, or a compressed result the file slot refused to substitute.
//!
//! ## Stale Results Are Discarded, Not Cancelled
//!
//! Re-selecting a file does not interrupt the run in flight. It bumps the
//! token, and the old run's completion (success or failure) is dropped on
//! arrival. The attempt cap bounds how long such a run can take.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod prepare;
pub mod preview;
pub mod process;
pub mod search;
pub mod source;
pub mod submission;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
