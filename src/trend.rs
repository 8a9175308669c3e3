//! Regression trend between two execution baselines.
//!
//! Deltas are always `current - reference`. A rate regresses when it moves in
//! the worsening direction by strictly more than its threshold; the p95
//! latency delta is compared in absolute milliseconds.

use crate::config::{ResolvedThreshold, ThresholdSet};
use crate::validate::BaselineProjection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Floating-point slack when a rate delta sits exactly on its threshold.
pub const TREND_RATE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStatus {
    Success,
    Failed,
    Skipped,
}

impl TrendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendStatus::Success => "SUCCESS",
            TrendStatus::Failed => "FAILED",
            TrendStatus::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMetric {
    SuccessRate,
    FailedRate,
    TimeoutRate,
    P95DurationMs,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 4] = [
        TrendMetric::SuccessRate,
        TrendMetric::FailedRate,
        TrendMetric::TimeoutRate,
        TrendMetric::P95DurationMs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendMetric::SuccessRate => "successRate",
            TrendMetric::FailedRate => "failedRate",
            TrendMetric::TimeoutRate => "timeoutRate",
            TrendMetric::P95DurationMs => "p95DurationMs",
        }
    }

    /// Baseline field the metric is read from.
    pub fn field(&self) -> &'static str {
        match self {
            TrendMetric::SuccessRate => "rates.successRate",
            TrendMetric::FailedRate => "rates.failedRate",
            TrendMetric::TimeoutRate => "rates.timeoutRate",
            TrendMetric::P95DurationMs => "latencyMs.p95",
        }
    }

    fn value(&self, baseline: &BaselineProjection) -> Option<f64> {
        match self {
            TrendMetric::SuccessRate => baseline.success_rate(),
            TrendMetric::FailedRate => baseline.failed_rate(),
            TrendMetric::TimeoutRate => baseline.timeout_rate(),
            TrendMetric::P95DurationMs => baseline.p95_duration_ms(),
        }
    }

    fn threshold(&self, thresholds: &ThresholdSet) -> (&'static str, ResolvedThreshold) {
        match self {
            TrendMetric::SuccessRate => ("maxSuccessRateDrop", thresholds.max_success_rate_drop),
            TrendMetric::FailedRate => ("maxFailedRateIncrease", thresholds.max_failed_rate_increase),
            TrendMetric::TimeoutRate => ("maxTimeoutRateIncrease", thresholds.max_timeout_rate_increase),
            TrendMetric::P95DurationMs => (
                "maxP95DurationIncreaseMs",
                thresholds.max_p95_duration_increase_ms,
            ),
        }
    }

    /// How much worse `delta` makes things; negative means an improvement.
    fn worsening(&self, delta: f64) -> f64 {
        match self {
            TrendMetric::SuccessRate => -delta,
            _ => delta,
        }
    }

    fn tolerance(&self) -> f64 {
        match self {
            TrendMetric::P95DurationMs => 0.0,
            _ => TREND_RATE_TOLERANCE,
        }
    }

    fn describe(&self, current: f64, reference: f64, worsening: f64, limit: (&str, f64)) -> String {
        let (limit_name, limit_value) = limit;
        match self {
            TrendMetric::P95DurationMs => format!(
                "{} increased by {}ms (reference {}, current {}) above {} {}",
                self.as_str(),
                worsening,
                reference,
                current,
                limit_name,
                limit_value
            ),
            TrendMetric::SuccessRate => format!(
                "{} dropped by {:.6} (reference {:.6}, current {:.6}) above {} {}",
                self.as_str(),
                worsening,
                reference,
                current,
                limit_name,
                limit_value
            ),
            _ => format!(
                "{} increased by {:.6} (reference {:.6}, current {:.6}) above {} {}",
                self.as_str(),
                worsening,
                reference,
                current,
                limit_name,
                limit_value
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDeltas {
    pub success_rate: Option<f64>,
    pub failed_rate: Option<f64>,
    pub timeout_rate: Option<f64>,
    pub p95_duration_ms: Option<f64>,
}

impl TrendDeltas {
    fn set(&mut self, metric: TrendMetric, delta: f64) {
        let slot = match metric {
            TrendMetric::SuccessRate => &mut self.success_rate,
            TrendMetric::FailedRate => &mut self.failed_rate,
            TrendMetric::TimeoutRate => &mut self.timeout_rate,
            TrendMetric::P95DurationMs => &mut self.p95_duration_ms,
        };
        *slot = Some(delta);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegressionResult {
    pub status: TrendStatus,
    pub current: BaselineProjection,
    pub reference: Option<BaselineProjection>,
    pub thresholds: ThresholdSet,
    pub deltas: TrendDeltas,
    pub regressions: Vec<String>,
    pub warnings: Vec<String>,
    pub validation_errors: Vec<String>,
}

pub fn compare_trend(
    current: &BaselineProjection,
    reference: Option<&BaselineProjection>,
    thresholds: &ThresholdSet,
    allow_missing_reference: bool,
) -> RegressionResult {
    let mut result = RegressionResult {
        status: TrendStatus::Success,
        current: current.clone(),
        reference: reference.cloned(),
        thresholds: *thresholds,
        deltas: TrendDeltas::default(),
        regressions: Vec::new(),
        warnings: Vec::new(),
        validation_errors: Vec::new(),
    };

    let Some(reference) = reference else {
        if allow_missing_reference {
            result.status = TrendStatus::Skipped;
            result
                .warnings
                .push("reference baseline missing; trend comparison skipped".to_string());
        } else {
            result.status = TrendStatus::Failed;
            result
                .validation_errors
                .push("trend reference report missing: no reference baseline supplied".to_string());
        }
        info!(status = result.status.as_str(), "trend comparison without reference");
        return result;
    };

    for metric in TrendMetric::ALL {
        let unverified_side = [("current", current), ("reference", reference)]
            .into_iter()
            .find(|(_, baseline)| !baseline.is_verified(metric.field()))
            .map(|(side, _)| side);
        if let Some(side) = unverified_side {
            result.warnings.push(format!(
                "{} failed validation in {} baseline; comparison skipped",
                metric.as_str(),
                side
            ));
            continue;
        }

        let (Some(now), Some(before)) = (metric.value(current), metric.value(reference)) else {
            let side = if metric.value(current).is_none() {
                "current"
            } else {
                "reference"
            };
            result.warnings.push(format!(
                "{} missing from {} baseline; comparison skipped",
                metric.as_str(),
                side
            ));
            continue;
        };

        let delta = now - before;
        result.deltas.set(metric, delta);
        let (limit_name, limit) = metric.threshold(thresholds);
        let worsening = metric.worsening(delta);
        debug!(
            metric = metric.as_str(),
            delta,
            limit = limit.value,
            "trend delta"
        );
        if worsening > limit.value + metric.tolerance() {
            result
                .regressions
                .push(metric.describe(now, before, worsening, (limit_name, limit.value)));
        }
    }

    if !result.regressions.is_empty() {
        result.status = TrendStatus::Failed;
    }
    info!(
        status = result.status.as_str(),
        regressions = result.regressions.len(),
        warnings = result.warnings.len(),
        "trend comparison finished"
    );
    result
}
