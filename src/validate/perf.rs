//! Benchmark (perf) reports.

use super::default_schema_version;
use super::fields::{Findings, Object};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

pub const REQUIRED_SCENARIOS: [&str; 4] = [
    "api.health",
    "executions.list",
    "executions.get",
    "executions.create",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfOptions {
    pub expected_schema_version: String,
    pub required_scenarios: Vec<String>,
    pub require_no_threshold_violations: bool,
}

impl Default for PerfOptions {
    fn default() -> Self {
        Self {
            expected_schema_version: default_schema_version(),
            required_scenarios: REQUIRED_SCENARIOS.iter().map(|s| s.to_string()).collect(),
            require_no_threshold_violations: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfMetric {
    pub id: Option<String>,
    pub sample_size: Option<u64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfLimits {
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfProjection {
    pub schema_version: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    pub metrics: Vec<PerfMetric>,
    pub limits: Option<PerfLimits>,
    pub recorded_violations: Option<Vec<String>>,
    /// (metric, limit) pairs the metrics exceed, as computed here.
    pub exceeded: Vec<String>,
    pub missing_scenarios: Vec<String>,
}

pub fn validate_perf(value: &Value, options: &PerfOptions) -> (PerfProjection, Findings) {
    let mut findings = Findings::new();
    let mut projection = PerfProjection::default();
    let Some(root) = findings.as_object(value, "") else {
        return (projection, findings);
    };

    projection.schema_version = findings.schema_version(root, &options.expected_schema_version);
    projection.generated_at = findings.timestamp(root, "", "generatedAt");

    let mut metrics_complete = false;
    if let Some(items) = findings.non_empty_array(root, "", "metrics") {
        let errors_before = findings.errors.len();
        let mut seen = HashSet::new();
        for (idx, item) in items.iter().enumerate() {
            let path = format!("metrics[{}]", idx);
            let Some(obj) = findings.as_object(item, &path) else {
                continue;
            };
            let metric = read_metric(obj, &path, &mut findings);
            if let Some(id) = metric.id.as_deref() {
                if !seen.insert(id.to_string()) {
                    findings.error(format!("{}: duplicate metric id '{}'", path, id));
                }
            }
            projection.metrics.push(metric);
        }
        metrics_complete = findings.errors.len() == errors_before;

        if metrics_complete {
            projection.missing_scenarios = options
                .required_scenarios
                .iter()
                .filter(|scenario| !seen.contains(scenario.as_str()))
                .cloned()
                .collect();
            for scenario in &projection.missing_scenarios {
                findings.error(format!("required perf scenario missing: {}", scenario));
            }
        }
    }

    if let Some(check) = findings.object(root, "", "thresholdCheck") {
        projection.limits = read_limits(check, &mut findings);
        projection.recorded_violations = findings.string_list(check, "thresholdCheck", "violations");
    }

    if let (true, Some(limits)) = (metrics_complete, projection.limits) {
        projection.exceeded = exceeded_limits(&projection.metrics, &limits);
        if let Some(recorded) = &projection.recorded_violations {
            if recorded.len() != projection.exceeded.len() {
                findings.error(format!(
                    "perf threshold violations count mismatch: expected {}, actual {}",
                    projection.exceeded.len(),
                    recorded.len()
                ));
            }
        }
    }

    if options.require_no_threshold_violations {
        if let Some(first) = projection.recorded_violations.as_ref().and_then(|v| v.first()) {
            findings.error(format!(
                "perf threshold violations present: {} recorded, first: {}",
                projection.recorded_violations.as_ref().map_or(0, Vec::len),
                first
            ));
        }
    }

    debug!(
        metrics = projection.metrics.len(),
        errors = findings.errors.len(),
        "validated perf report"
    );
    (projection, findings)
}

fn read_metric(obj: &Object, path: &str, findings: &mut Findings) -> PerfMetric {
    let id = findings.string(obj, path, "id").map(str::to_string);
    let sample_size = findings.count(obj, path, "sampleSize");
    if sample_size == Some(0) {
        findings.error(format!("{}.sampleSize must be positive", path));
    }
    let p50_ms = findings.non_negative_number(obj, path, "p50Ms");
    let p95_ms = findings.non_negative_number(obj, path, "p95Ms");
    let p99_ms = findings.non_negative_number(obj, path, "p99Ms");

    if let (Some(p50), Some(p95), Some(p99)) = (p50_ms, p95_ms, p99_ms) {
        let label = id.as_deref().unwrap_or(path);
        if p50 > p95 {
            findings.error(format!(
                "percentile order violation: {} p50Ms {} > p95Ms {}",
                label, p50, p95
            ));
        }
        if p95 > p99 {
            findings.error(format!(
                "percentile order violation: {} p95Ms {} > p99Ms {}",
                label, p95, p99
            ));
        }
    }

    PerfMetric {
        id,
        sample_size,
        p50_ms,
        p95_ms,
        p99_ms,
    }
}

fn read_limits(check: &Object, findings: &mut Findings) -> Option<PerfLimits> {
    let limits = findings.object(check, "thresholdCheck", "limits")?;
    let parent = "thresholdCheck.limits";
    let mut valid = true;
    let mut optional_limit = |key: &str, findings: &mut Findings| -> Option<f64> {
        match limits.get(key) {
            None | Some(Value::Null) => None,
            Some(_) => {
                let value = findings.non_negative_number(limits, parent, key);
                valid &= value.is_some();
                value
            }
        }
    };
    let p95_ms = optional_limit("p95Ms", findings);
    let p99_ms = optional_limit("p99Ms", findings);
    valid.then_some(PerfLimits { p95_ms, p99_ms })
}

fn exceeded_limits(metrics: &[PerfMetric], limits: &PerfLimits) -> Vec<String> {
    let mut exceeded = Vec::new();
    for metric in metrics {
        let id = metric.id.as_deref().unwrap_or("?");
        let pairs = [
            ("p95Ms", metric.p95_ms, limits.p95_ms),
            ("p99Ms", metric.p99_ms, limits.p99_ms),
        ];
        for (name, value, limit) in pairs {
            if let (Some(value), Some(limit)) = (value, limit) {
                if value > limit {
                    exceeded.push(format!("{} {} {} > {}", id, name, value, limit));
                }
            }
        }
    }
    exceeded
}
