//! Trend threshold configuration.
//!
//! Each threshold resolves independently: explicit override, then the
//! thresholds file (`[trend]` section), then the built-in default. The
//! resolved value keeps the layer it came from.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_MAX_SUCCESS_RATE_DROP: f64 = 0.02;
pub const DEFAULT_MAX_FAILED_RATE_INCREASE: f64 = 0.02;
pub const DEFAULT_MAX_TIMEOUT_RATE_INCREASE: f64 = 0.01;
pub const DEFAULT_MAX_P95_DURATION_INCREASE_MS: f64 = 5_000.0;

/// Any subset of the trend thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialThresholds {
    #[serde(default)]
    pub max_success_rate_drop: Option<f64>,
    #[serde(default)]
    pub max_failed_rate_increase: Option<f64>,
    #[serde(default)]
    pub max_timeout_rate_increase: Option<f64>,
    #[serde(default)]
    pub max_p95_duration_increase_ms: Option<f64>,
}

impl PartialThresholds {
    pub fn defaults() -> Self {
        Self {
            max_success_rate_drop: Some(DEFAULT_MAX_SUCCESS_RATE_DROP),
            max_failed_rate_increase: Some(DEFAULT_MAX_FAILED_RATE_INCREASE),
            max_timeout_rate_increase: Some(DEFAULT_MAX_TIMEOUT_RATE_INCREASE),
            max_p95_duration_increase_ms: Some(DEFAULT_MAX_P95_DURATION_INCREASE_MS),
        }
    }

    fn entries(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("maxSuccessRateDrop", self.max_success_rate_drop),
            ("maxFailedRateIncrease", self.max_failed_rate_increase),
            ("maxTimeoutRateIncrease", self.max_timeout_rate_increase),
            ("maxP95DurationIncreaseMs", self.max_p95_duration_increase_ms),
        ]
    }

    /// Thresholds are ceilings on a worsening; negative or non-finite values are rejected.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.entries() {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    bail!("{} must be a non-negative number, got {}", name, value);
                }
            }
        }
        Ok(())
    }
}

/// On-disk thresholds file; only the `trend` section is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdsFile {
    #[serde(default)]
    pub trend: PartialThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdSource {
    Override,
    File,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedThreshold {
    pub value: f64,
    pub source: ThresholdSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSet {
    pub max_success_rate_drop: ResolvedThreshold,
    pub max_failed_rate_increase: ResolvedThreshold,
    pub max_timeout_rate_increase: ResolvedThreshold,
    pub max_p95_duration_increase_ms: ResolvedThreshold,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        resolve_thresholds(&PartialThresholds::default(), None)
    }
}

fn pick(override_value: Option<f64>, file_value: Option<f64>, default: f64) -> ResolvedThreshold {
    match (override_value, file_value) {
        (Some(value), _) => ResolvedThreshold {
            value,
            source: ThresholdSource::Override,
        },
        (None, Some(value)) => ResolvedThreshold {
            value,
            source: ThresholdSource::File,
        },
        (None, None) => ResolvedThreshold {
            value: default,
            source: ThresholdSource::Default,
        },
    }
}

pub fn resolve_thresholds(
    overrides: &PartialThresholds,
    file: Option<&PartialThresholds>,
) -> ThresholdSet {
    let file = file.copied().unwrap_or_default();
    ThresholdSet {
        max_success_rate_drop: pick(
            overrides.max_success_rate_drop,
            file.max_success_rate_drop,
            DEFAULT_MAX_SUCCESS_RATE_DROP,
        ),
        max_failed_rate_increase: pick(
            overrides.max_failed_rate_increase,
            file.max_failed_rate_increase,
            DEFAULT_MAX_FAILED_RATE_INCREASE,
        ),
        max_timeout_rate_increase: pick(
            overrides.max_timeout_rate_increase,
            file.max_timeout_rate_increase,
            DEFAULT_MAX_TIMEOUT_RATE_INCREASE,
        ),
        max_p95_duration_increase_ms: pick(
            overrides.max_p95_duration_increase_ms,
            file.max_p95_duration_increase_ms,
            DEFAULT_MAX_P95_DURATION_INCREASE_MS,
        ),
    }
}

/// Load the `trend` section of a thresholds file. `.toml` files are parsed as
/// TOML, anything else as JSON.
pub fn load_thresholds_file(path: &Path) -> Result<PartialThresholds> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read thresholds file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let file: ThresholdsFile = if is_toml {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse thresholds file {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse thresholds file {}", path.display()))?
    };
    file.trend
        .validate()
        .with_context(|| format!("Invalid thresholds in {}", path.display()))?;
    debug!(path = %path.display(), "loaded trend thresholds file");
    Ok(file.trend)
}
