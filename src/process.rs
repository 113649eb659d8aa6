//! Batch driver behind `upload-prep prepare`.
//!
//! Each input file goes through the same steps a single upload would:
//!
//! ```text
//! read file → SubmissionAdapter::select → Preparer::prepare
//!           → SubmissionAdapter::complete → gate → write payload
//! ```
//!
//! Every file gets its own adapter, so files are independent and run in
//! parallel on the rayon pool. Progress is reported through an optional
//! `mpsc` channel as each file finishes; the CLI drains it on a printer thread.

use crate::naming::{unique_stems, with_stem};
use crate::prepare::{PrepareSettings, Preparer};
use crate::source::{SourceImage, SourceKind};
use crate::submission::{InMemorySlot, SubmissionAdapter};
use crate::types::PreparationOutcome;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Form field the payload is submitted under
    pub field_name: String,
    /// Where accepted payloads are written. `None` for a dry run.
    pub output_dir: Option<PathBuf>,
}

/// Per-file result, printed by the CLI and serialized for `--json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: String,
    pub outcome: String,
    pub original_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    /// Field name and filename of the accepted submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_as: Option<String>,
    /// SHA-256 of the submitted bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Corrective message shown after a failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the submission gate refused the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<String>,
}

impl FileReport {
    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started { total: usize },
    FileProcessed { index: usize, report: FileReport },
}

/// Expand directories into the files beneath them, in file-name order.
///
/// Hidden entries (leading `.`) inside walked directories are skipped;
/// explicitly named files are always kept.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ProcessError> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            inputs.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(ProcessError::InputNotFound(path.clone()));
        }
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for entry in walker {
            let entry = entry.map_err(|source| ProcessError::Walk {
                path: path.clone(),
                source,
            })?;
            if entry.file_type().is_file() {
                inputs.push(entry.into_path());
            }
        }
    }
    Ok(inputs)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Hex SHA-256 of a payload.
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Run one file through preparation, adapter and gate.
pub fn process_file(
    preparer: &Preparer,
    path: &Path,
    options: &ProcessOptions,
) -> Result<FileReport, ProcessError> {
    process_named(preparer, path, options, None)
}

/// [`process_file`], writing the payload under `output_stem` when given.
fn process_named(
    preparer: &Preparer,
    path: &Path,
    options: &ProcessOptions,
    output_stem: Option<&str>,
) -> Result<FileReport, ProcessError> {
    let source = SourceImage::from_path(path)?;
    let mut adapter =
        SubmissionAdapter::new(InMemorySlot::default(), &options.field_name, preparer.budget());

    let token = adapter.select(&source);
    let outcome = preparer.prepare(&source);
    let mut report = FileReport {
        source: path.display().to_string(),
        outcome: outcome.label().to_string(),
        original_size: source.len(),
        ..FileReport::default()
    };
    if let PreparationOutcome::Compressed { file, .. } = &outcome {
        report.dimensions = Some((file.target.width, file.target.height));
        report.quality = Some(file.target.quality.value());
        report.attempts = Some(file.attempts);
    }
    adapter.complete(token, outcome);

    report.feedback = adapter.size_feedback();
    report.message = adapter.message().map(str::to_string);

    match adapter.gate() {
        Ok(submission) => {
            report.final_size = Some(submission.file.len());
            report.field = Some(submission.field_name.clone());
            report.submitted_as = Some(submission.file.filename.clone());
            report.sha256 = Some(digest_hex(&submission.file.bytes));
            if let Some(dir) = &options.output_dir {
                std::fs::create_dir_all(dir)?;
                let name = match output_stem {
                    Some(stem) => with_stem(&submission.file.filename, stem),
                    None => submission.file.filename.clone(),
                };
                let dest = dir.join(name);
                std::fs::write(&dest, &submission.file.bytes)?;
                report.written_to = Some(dest.display().to_string());
            }
        }
        Err(e) => report.blocked = Some(e.to_string()),
    }
    Ok(report)
}

/// Process every input in parallel. Reports come back in input order.
///
/// Output names are reserved before the parallel stage, so inputs sharing a
/// base name land in distinct files (`x.jpg`, `x-2.jpg`) in input order.
pub fn process_all(
    preparer: &Preparer,
    inputs: &[PathBuf],
    options: &ProcessOptions,
    events: Option<Sender<ProcessEvent>>,
) -> Result<Vec<FileReport>, ProcessError> {
    if let Some(tx) = &events {
        tx.send(ProcessEvent::Started {
            total: inputs.len(),
        })
        .ok();
    }
    let names: Vec<String> = inputs
        .iter()
        .map(|p| {
            p.file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect();
    let stems = unique_stems(names.iter().map(String::as_str));

    inputs
        .par_iter()
        .zip(stems.par_iter())
        .enumerate()
        .map_with(events, |events, (index, (path, stem))| {
            let report = process_named(preparer, path, options, Some(stem.as_str()))?;
            if let Some(tx) = events {
                tx.send(ProcessEvent::FileProcessed {
                    index: index + 1,
                    report: report.clone(),
                })
                .ok();
            }
            Ok(report)
        })
        .collect()
}

/// What `upload-prep check` reports for one file. Nothing is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckEntry {
    pub source: String,
    pub mime: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,
    pub verdict: CheckVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckVerdict {
    /// Would be submitted as-is
    WithinLimits,
    /// Would be decoded and re-encoded
    NeedsProcessing,
    /// Not re-encodable and over budget; would be allowed through as-is
    OversizedPassthrough,
    /// Not an image; would be submitted as-is, subject to the gate
    NotImage,
}

impl CheckVerdict {
    pub fn label(self) -> &'static str {
        match self {
            CheckVerdict::WithinLimits => "within limits",
            CheckVerdict::NeedsProcessing => "needs processing",
            CheckVerdict::OversizedPassthrough => "oversized (passed through)",
            CheckVerdict::NotImage => "not an image",
        }
    }
}

/// Classify a file from its MIME type, size and header alone.
pub fn check_file(path: &Path, settings: &PrepareSettings) -> Result<CheckEntry, ProcessError> {
    let source = SourceImage::from_path(path)?;
    let dimensions = source.probe_dimensions();
    let within_budget = source.len() <= settings.budget_bytes;
    let verdict = match source.classify() {
        SourceKind::NotProcessable => CheckVerdict::NotImage,
        SourceKind::Passthrough if within_budget => CheckVerdict::WithinLimits,
        SourceKind::Passthrough => CheckVerdict::OversizedPassthrough,
        SourceKind::Eligible(_) => {
            let fits = dimensions.is_some_and(|(w, h)| w.max(h) <= settings.max_dimension);
            if within_budget && fits {
                CheckVerdict::WithinLimits
            } else {
                CheckVerdict::NeedsProcessing
            }
        }
    };
    Ok(CheckEntry {
        source: path.display().to_string(),
        mime: source.mime().to_string(),
        size: source.len(),
        dimensions,
        verdict,
    })
}
