//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Prepare
//!
//! ```text
//! Preparing 3 files
//! 001 IMG_2041.jpeg → IMG_2041.jpg
//!     compressed: 12 MB → 2.9 MB (1600x1200, q70, 4 attempts)
//!     Written: out/IMG_2041.jpg
//! 002 logo.png
//!     unchanged: 180.4 KB
//! 003 noise.png
//!     failed: Could not shrink this image under 3 MB. Please choose a smaller image.
//!     Blocked: No image selected
//!
//! 3 files: 1 compressed, 1 unchanged, 1 blocked
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 IMG_2041.jpeg (image/jpeg, 12 MB, 8000x6000): needs processing
//! 002 logo.png (image/png, 180.4 KB, 500x500): within limits
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::process::{CheckEntry, FileReport, ProcessEvent};
use std::path::Path;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable byte count, base 1024.
///
/// Whole values print without a decimal (`3 MB`), others with one
/// (`2.9 MB`). Counts under 1 KB print exactly (`512 B`).
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {}", UNITS[unit])
    } else {
        format!("{rounded:.1} {}", UNITS[unit])
    }
}

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn format_dimensions((w, h): (u32, u32)) -> String {
    format!("{w}x{h}")
}

// ============================================================================
// Prepare
// ============================================================================

/// Format one file's report.
pub fn format_file_report(index: usize, report: &FileReport) -> Vec<String> {
    let mut lines = Vec::new();
    let name = file_name(&report.source);

    match &report.submitted_as {
        Some(submitted) if *submitted != name => {
            lines.push(format!("{} {} → {}", format_index(index), name, submitted))
        }
        _ => lines.push(format!("{} {}", format_index(index), name)),
    }

    let detail = match (&report.message, &report.feedback) {
        (Some(message), _) => message.clone(),
        (None, Some(feedback)) => feedback.clone(),
        (None, None) => format_bytes(report.original_size),
    };
    let mut status = format!("    {}: {}", report.outcome, detail);
    if let (Some(dims), Some(q), Some(n)) = (report.dimensions, report.quality, report.attempts) {
        let noun = if n == 1 { "attempt" } else { "attempts" };
        status.push_str(&format!(" ({}, q{}, {} {})", format_dimensions(dims), q, n, noun));
    }
    lines.push(status);

    if let Some(dest) = &report.written_to {
        lines.push(format!("    Written: {}", dest));
    }
    if let Some(reason) = &report.blocked {
        lines.push(format!("    Blocked: {}", reason));
    }
    lines
}

/// Format a single progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { total } => {
            let noun = if *total == 1 { "file" } else { "files" };
            vec![format!("Preparing {} {}", total, noun)]
        }
        ProcessEvent::FileProcessed { index, report } => format_file_report(*index, report),
    }
}

/// Closing summary line: counts per outcome, plus blocked files.
pub fn format_summary(reports: &[FileReport]) -> String {
    let count = |label: &str| reports.iter().filter(|r| r.outcome == label).count();
    let mut parts = Vec::new();
    for label in ["compressed", "unchanged", "oversized"] {
        let n = count(label);
        if n > 0 {
            parts.push(format!("{n} {label}"));
        }
    }
    let blocked = reports.iter().filter(|r| r.is_blocked()).count();
    if blocked > 0 {
        parts.push(format!("{blocked} blocked"));
    }
    let noun = if reports.len() == 1 { "file" } else { "files" };
    if parts.is_empty() {
        format!("{} {}", reports.len(), noun)
    } else {
        format!("{} {}: {}", reports.len(), noun, parts.join(", "))
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check(entries: &[CheckEntry]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut facts = vec![entry.mime.clone(), format_bytes(entry.size)];
            if let Some(dims) = entry.dimensions {
                facts.push(format_dimensions(dims));
            }
            format!(
                "{} {} ({}): {}",
                format_index(i + 1),
                file_name(&entry.source),
                facts.join(", "),
                entry.verdict.label()
            )
        })
        .collect()
}

pub fn print_check(entries: &[CheckEntry]) {
    for line in format_check(entries) {
        println!("{}", line);
    }
}
