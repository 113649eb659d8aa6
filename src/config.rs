//! Configuration loading, validation and merging.
//!
//! Three layers, later layers override earlier ones key by key:
//!
//! ```text
//! stock defaults → --config <FILE> → UPLOAD_PREP_* environment variables
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! budget_bytes = 3145728        # Must equal the server's accepted upload limit
//! max_dimension = 1600          # Longer edge, in pixels
//! max_decoded_pixels = 100000000
//!
//! [search]
//! max_attempts = 10
//! quality_step = 10
//! floor_quality = 50
//! shrink_ratio = 0.85
//! min_side = 480
//! keep_unreduced_original = true
//!
//! [output]
//! format = "jpeg"               # "jpeg" | "avif"
//!
//! [codecs]
//! decoder = "auto"              # "auto" | "native" | "compat"
//! encoder = "auto"              # "auto" | "direct" | "base64"
//!
//! [submission]
//! field_name = "image"
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Environment
//!
//! | Variable | Overrides |
//! |---|---|
//! | `UPLOAD_PREP_BUDGET_BYTES` | `limits.budget_bytes` |
//! | `UPLOAD_PREP_MAX_DIMENSION` | `limits.max_dimension` |
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{DecoderPreference, EncoderPreference, OutputFormat, Quality, Toolkit};
use crate::prepare::{DEFAULT_BUDGET_BYTES, DEFAULT_MAX_DIMENSION, PrepareSettings};
use crate::search::SearchSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const ENV_BUDGET_BYTES: &str = "UPLOAD_PREP_BUDGET_BYTES";
pub const ENV_MAX_DIMENSION: &str = "UPLOAD_PREP_MAX_DIMENSION";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    /// Byte budget and pixel limits.
    pub limits: LimitsConfig,
    /// Convergence search knobs.
    pub search: SearchConfig,
    pub output: OutputConfig,
    /// Decoder/encoder variant selection.
    pub codecs: CodecConfig,
    pub submission: SubmissionConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub budget_bytes: u64,
    pub max_dimension: u32,
    /// Images whose header reports more pixels are rejected before decoding.
    pub max_decoded_pixels: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            budget_bytes: DEFAULT_BUDGET_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_decoded_pixels: 100_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub max_attempts: u32,
    pub quality_step: u32,
    pub floor_quality: u32,
    pub shrink_ratio: f64,
    pub min_side: u32,
    pub keep_unreduced_original: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let search = SearchSettings::default();
        Self {
            max_attempts: search.max_attempts,
            quality_step: search.quality_step,
            floor_quality: search.floor_quality.value(),
            shrink_ratio: search.shrink_ratio,
            min_side: search.min_side,
            keep_unreduced_original: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    pub decoder: DecoderPreference,
    pub encoder: EncoderPreference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionConfig {
    /// Form field the image travels under.
    pub field_name: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            field_name: "image".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

impl PrepConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::Validation(msg.to_string()));

        if self.limits.budget_bytes == 0 {
            return fail("limits.budget_bytes must be greater than 0");
        }
        if self.limits.max_dimension == 0 {
            return fail("limits.max_dimension must be at least 1");
        }
        if self.limits.max_decoded_pixels == 0 {
            return fail("limits.max_decoded_pixels must be at least 1");
        }
        if self.search.max_attempts == 0 {
            return fail("search.max_attempts must be at least 1");
        }
        if self.search.quality_step == 0 {
            return fail("search.quality_step must be at least 1");
        }
        if !(self.search.shrink_ratio > 0.0 && self.search.shrink_ratio < 1.0) {
            return fail("search.shrink_ratio must be between 0 and 1 (exclusive)");
        }
        if self.search.min_side == 0 {
            return fail("search.min_side must be at least 1");
        }
        let initial = self.output.format.initial_quality().value();
        if self.search.floor_quality == 0 || self.search.floor_quality > initial {
            return Err(ConfigError::Validation(format!(
                "search.floor_quality must be 1-{initial} for {} output",
                self.output.format
            )));
        }
        if self.submission.field_name.trim().is_empty() {
            return fail("submission.field_name must not be empty");
        }
        Ok(())
    }

    pub fn prepare_settings(&self) -> PrepareSettings {
        PrepareSettings {
            budget_bytes: self.limits.budget_bytes,
            max_dimension: self.limits.max_dimension,
            format: self.output.format,
            search: SearchSettings {
                max_attempts: self.search.max_attempts,
                quality_step: self.search.quality_step,
                floor_quality: Quality::new(self.search.floor_quality),
                shrink_ratio: self.search.shrink_ratio,
                min_side: self.search.min_side,
            },
            keep_unreduced_original: self.search.keep_unreduced_original,
        }
    }

    /// Probe the codecs once, honouring `[codecs]`.
    pub fn toolkit(&self) -> Toolkit {
        Toolkit::probe(
            self.codecs.decoder,
            self.codecs.encoder,
            self.output.format,
            self.limits.max_decoded_pixels,
        )
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PrepConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. The file must exist.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the environment layer from `(name, value)` pairs.
///
/// Unrelated variables are ignored. Returns `Ok(None)` when no
/// `UPLOAD_PREP_*` override is present.
pub fn env_overlay<I>(vars: I) -> Result<Option<toml::Value>, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut limits = toml::map::Map::new();
    for (name, value) in vars {
        let key = match name.as_str() {
            ENV_BUDGET_BYTES => "budget_bytes",
            ENV_MAX_DIMENSION => "max_dimension",
            _ => continue,
        };
        let parsed = value
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|n| *n >= 0)
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "{name} must be a non-negative integer, got {value:?}"
                ))
            })?;
        limits.insert(key.to_string(), toml::Value::Integer(parsed));
    }
    if limits.is_empty() {
        return Ok(None);
    }
    let mut root = toml::map::Map::new();
    root.insert("limits".to_string(), toml::Value::Table(limits));
    Ok(Some(toml::Value::Table(root)))
}

/// Merge optional overlays onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<PrepConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: PrepConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config: stock defaults, then the optional file, then
/// the environment.
///
/// The CLI passes `std::env::vars()`; tests pass explicit pairs.
pub fn load_config<I>(path: Option<&Path>, env: I) -> Result<PrepConfig, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let file = path.map(load_raw_config).transpose()?;
    let env = env_overlay(env)?;
    resolve_config(stock_defaults_value(), file.into_iter().chain(env))
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# upload-prep Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Load with: upload-prep --config upload-prep.toml prepare ...
# UPLOAD_PREP_BUDGET_BYTES and UPLOAD_PREP_MAX_DIMENSION override [limits].
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted upload, in bytes. Must equal the server's limit.
budget_bytes = 3145728

# Longer edge of the submitted image, in pixels.
max_dimension = 1600

# Images whose header reports more pixels than this are rejected unread.
max_decoded_pixels = 100000000

# ---------------------------------------------------------------------------
# Convergence search
# ---------------------------------------------------------------------------
[search]
# Total encode attempts before giving up. Quality steps count too: with the
# defaults, five attempts walk 90 → 50 and the five shrinks left end at a
# longer edge of roughly 700px, so this cap binds before min_side does.
max_attempts = 10

# Quality decrement per attempt, and the quality it stops at.
quality_step = 10
floor_quality = 50

# At the floor, both sides shrink by this factor per attempt...
shrink_ratio = 0.85

# ...but the longer edge never drops below this many pixels.
min_side = 480

# Submit the original bytes when the first encode already fit without any
# resize or reduction (only if the original itself fits the budget).
keep_unreduced_original = true

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Lossy format every re-encoded image is normalized to: "jpeg" or "avif".
format = "jpeg"

# ---------------------------------------------------------------------------
# Codecs
# ---------------------------------------------------------------------------
[codecs]
# "auto" probes once at startup. "native" / "compat" force a decoder.
decoder = "auto"

# "auto", "direct" or "base64". Both encoders produce identical bytes.
encoder = "auto"

# ---------------------------------------------------------------------------
# Submission
# ---------------------------------------------------------------------------
[submission]
# Form field name the image is submitted under.
field_name = "image"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
