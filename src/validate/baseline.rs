//! Execution-baseline reports: totals, derived rates, latency percentiles and
//! the gate verdict recorded for a time window of executions.

use super::default_schema_version;
use super::fields::{Findings, Object};
use crate::util::{approx_eq, ratio, RATE_TOLERANCE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineOptions {
    pub expected_schema_version: String,
    /// The gate must have been evaluated and passed.
    pub require_gate_pass: bool,
    pub require_no_warnings: bool,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            expected_schema_version: default_schema_version(),
            require_gate_pass: false,
            require_no_warnings: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineWindow {
    pub since: Option<DateTime<Utc>>,
    pub days: Option<u64>,
    pub batch_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineTotals {
    pub executions: u64,
    pub completed: u64,
    pub running: u64,
    pub pending: u64,
    pub success: u64,
    pub failed: u64,
    pub canceled: u64,
    pub timeout_failures: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineRates {
    pub success_rate: Option<f64>,
    pub failed_rate: Option<f64>,
    pub canceled_rate: Option<f64>,
    pub timeout_rate: Option<f64>,
    pub completed_success_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyPercentiles {
    pub p50: Option<f64>,
    pub p90: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineGate {
    pub passed: Option<bool>,
    pub evaluated: Option<bool>,
    pub violations: Option<Vec<String>>,
    pub warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineProjection {
    pub schema_version: Option<String>,
    pub run_id: Option<String>,
    pub window: BaselineWindow,
    pub totals: Option<BaselineTotals>,
    pub rates: BaselineRates,
    pub latency_ms: LatencyPercentiles,
    pub gate: Option<BaselineGate>,
    /// Fields that were read but contradicted a cross-check, such as a rate
    /// that disagrees with the totals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unverified: Vec<String>,
}

impl BaselineProjection {
    pub fn success_rate(&self) -> Option<f64> {
        self.rates.success_rate
    }

    pub fn failed_rate(&self) -> Option<f64> {
        self.rates.failed_rate
    }

    pub fn timeout_rate(&self) -> Option<f64> {
        self.rates.timeout_rate
    }

    pub fn p95_duration_ms(&self) -> Option<f64> {
        self.latency_ms.p95
    }

    pub fn is_verified(&self, field: &str) -> bool {
        !self.unverified.iter().any(|f| f == field)
    }
}

pub fn validate_baseline(value: &Value, options: &BaselineOptions) -> (BaselineProjection, Findings) {
    let mut findings = Findings::new();
    let mut projection = BaselineProjection::default();
    let Some(root) = findings.as_object(value, "") else {
        return (projection, findings);
    };

    projection.schema_version = findings.schema_version(root, &options.expected_schema_version);
    projection.run_id = findings.string(root, "", "runId").map(str::to_string);

    if let Some(window) = findings.object(root, "", "window") {
        projection.window = read_window(window, &mut findings);
    }
    if let Some(totals) = findings.object(root, "", "totals") {
        projection.totals = read_totals(totals, &mut findings);
    }
    if let Some(totals) = &projection.totals {
        check_totals(totals, &mut findings);
    }
    if let Some(rates) = findings.object(root, "", "rates") {
        projection.rates = read_rates(rates, &mut findings);
        if let Some(totals) = &projection.totals {
            check_rates(totals, &projection.rates, &mut projection.unverified, &mut findings);
        }
    }
    if let Some(latency) = findings.object(root, "", "latencyMs") {
        projection.latency_ms = read_latency(latency, &mut projection.unverified, &mut findings);
    }
    if let Some(gate) = findings.object(root, "", "gate") {
        let gate = read_gate(gate, &mut findings);
        check_gate(&gate, options, &mut findings);
        projection.gate = Some(gate);
    }

    debug!(
        run_id = projection.run_id.as_deref().unwrap_or("-"),
        errors = findings.errors.len(),
        warnings = findings.warnings.len(),
        "validated execution baseline"
    );
    (projection, findings)
}

fn read_window(window: &Object, findings: &mut Findings) -> BaselineWindow {
    let positive = |key: &str, findings: &mut Findings| {
        let value = findings.count(window, "window", key)?;
        if value == 0 {
            findings.error(format!("window.{} must be positive", key));
            return None;
        }
        Some(value)
    };
    let days = positive("days", findings);
    let batch_size = positive("batchSize", findings);
    BaselineWindow {
        since: findings.timestamp(window, "window", "since"),
        days,
        batch_size,
    }
}

fn read_totals(totals: &Object, findings: &mut Findings) -> Option<BaselineTotals> {
    let mut count = |key: &str| findings.count(totals, "totals", key);
    let executions = count("executions");
    let completed = count("completed");
    let running = count("running");
    let pending = count("pending");
    let success = count("success");
    let failed = count("failed");
    let canceled = count("canceled");
    let timeout_failures = count("timeoutFailures");

    Some(BaselineTotals {
        executions: executions?,
        completed: completed?,
        running: running?,
        pending: pending?,
        success: success?,
        failed: failed?,
        canceled: canceled?,
        timeout_failures: timeout_failures?,
    })
}

fn check_totals(totals: &BaselineTotals, findings: &mut Findings) {
    let sum = |parts: [u64; 3]| parts.into_iter().try_fold(0u64, u64::checked_add);
    match sum([totals.success, totals.failed, totals.canceled]) {
        Some(finished) if finished == totals.completed => {}
        Some(finished) => findings.error(format!(
            "totals mismatch: completed {} != success+failed+canceled {}",
            totals.completed, finished
        )),
        None => findings.error("totals mismatch: success+failed+canceled overflows"),
    }
    match sum([totals.completed, totals.running, totals.pending]) {
        Some(known) if known == totals.executions => {}
        Some(known) => findings.error(format!(
            "totals mismatch: executions {} != completed+running+pending {}",
            totals.executions, known
        )),
        None => findings.error("totals mismatch: completed+running+pending overflows"),
    }
    if totals.timeout_failures > totals.failed {
        findings.error(format!(
            "totals mismatch: timeoutFailures {} exceeds failed {}",
            totals.timeout_failures, totals.failed
        ));
    }
}

fn read_rates(rates: &Object, findings: &mut Findings) -> BaselineRates {
    let mut rate = |key: &str| {
        let value = findings.number(rates, "rates", key)?;
        if !(0.0..=1.0).contains(&value) {
            findings.error(format!("rates.{} must be within [0, 1], got {}", key, value));
            return None;
        }
        Some(value)
    };
    BaselineRates {
        success_rate: rate("successRate"),
        failed_rate: rate("failedRate"),
        canceled_rate: rate("canceledRate"),
        timeout_rate: rate("timeoutRate"),
        completed_success_rate: rate("completedSuccessRate"),
    }
}

fn check_rates(
    totals: &BaselineTotals,
    rates: &BaselineRates,
    unverified: &mut Vec<String>,
    findings: &mut Findings,
) {
    let expected = [
        ("successRate", rates.success_rate, ratio(totals.success, totals.executions)),
        ("failedRate", rates.failed_rate, ratio(totals.failed, totals.executions)),
        ("canceledRate", rates.canceled_rate, ratio(totals.canceled, totals.executions)),
        ("timeoutRate", rates.timeout_rate, ratio(totals.timeout_failures, totals.executions)),
        (
            "completedSuccessRate",
            rates.completed_success_rate,
            ratio(totals.success, totals.completed),
        ),
    ];
    for (name, declared, derived) in expected {
        let Some(declared) = declared else {
            continue;
        };
        if !approx_eq(declared, derived, RATE_TOLERANCE) {
            unverified.push(format!("rates.{}", name));
            findings.error(format!(
                "rate mismatch: rates.{} expected {:.6}, actual {}",
                name, derived, declared
            ));
        }
    }
}

fn read_latency(latency: &Object, unverified: &mut Vec<String>, findings: &mut Findings) -> LatencyPercentiles {
    let mut percentile = |key: &str| findings.non_negative_number(latency, "latencyMs", key);
    let percentiles = LatencyPercentiles {
        p50: percentile("p50"),
        p90: percentile("p90"),
        p95: percentile("p95"),
        p99: percentile("p99"),
    };

    let ordered = [
        ("p50", percentiles.p50),
        ("p90", percentiles.p90),
        ("p95", percentiles.p95),
        ("p99", percentiles.p99),
    ];
    if ordered.iter().all(|(_, value)| value.is_some()) {
        for pair in ordered.windows(2) {
            if let [(low_name, Some(low)), (high_name, Some(high))] = pair {
                if low > high {
                    for name in [low_name, high_name] {
                        let field = format!("latencyMs.{}", name);
                        if !unverified.contains(&field) {
                            unverified.push(field);
                        }
                    }
                    findings.error(format!(
                        "percentile order violation: latencyMs.{} {} > latencyMs.{} {}",
                        low_name, low, high_name, high
                    ));
                }
            }
        }
    }
    percentiles
}

fn read_gate(gate: &Object, findings: &mut Findings) -> BaselineGate {
    let passed = findings.boolean(gate, "gate", "passed");
    let evaluated = findings.boolean(gate, "gate", "evaluated");
    findings.object(gate, "gate", "thresholds");
    BaselineGate {
        passed,
        evaluated,
        violations: findings.string_list(gate, "gate", "violations"),
        warnings: findings.string_list(gate, "gate", "warnings"),
    }
}

fn check_gate(gate: &BaselineGate, options: &BaselineOptions, findings: &mut Findings) {
    if gate.passed == Some(true) {
        if let Some(violations) = gate.violations.as_ref().filter(|v| !v.is_empty()) {
            findings.error(format!(
                "gate consistency violation: gate.passed is true with {} violation(s)",
                violations.len()
            ));
        }
        if gate.evaluated == Some(false) {
            findings.error("gate consistency violation: gate.passed is true but gate.evaluated is false");
        }
    }

    if options.require_gate_pass {
        match (gate.evaluated, gate.passed) {
            (Some(false), _) => findings.error("gate not passed: gate was not evaluated"),
            (Some(true), Some(false)) => {
                let violations = gate.violations.as_deref().unwrap_or_default();
                findings.error(format!(
                    "gate not passed: {} violation(s){}",
                    violations.len(),
                    violations
                        .first()
                        .map(|first| format!(", first: {}", first))
                        .unwrap_or_default()
                ));
            }
            _ => {}
        }
    }

    if let Some(warnings) = gate.warnings.as_ref() {
        if let Some(first) = warnings.first() {
            if options.require_no_warnings {
                findings.error(format!(
                    "gate warnings present: {} warning(s), first: {}",
                    warnings.len(),
                    first
                ));
            } else {
                findings.warn(format!("gate warning: {}", first));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::{classify, ReasonCode};
    use serde_json::json;

    /// 200 executions: 180 completed (171 success, 6 failed of which 2 timed
    /// out, 3 canceled), 15 running, 5 pending.
    fn report() -> Value {
        json!({
            "schemaVersion": "1",
            "runId": "baseline-2026-10-19",
            "window": {"since": "2026-10-12T00:00:00Z", "days": 7, "batchSize": 500},
            "totals": {
                "executions": 200, "completed": 180, "running": 15, "pending": 5,
                "success": 171, "failed": 6, "canceled": 3, "timeoutFailures": 2
            },
            "rates": {
                "successRate": 0.855,
                "failedRate": 0.03,
                "canceledRate": 0.015,
                "timeoutRate": 0.01,
                "completedSuccessRate": 0.95
            },
            "latencyMs": {"p50": 1200, "p90": 4200, "p95": 6100, "p99": 9800},
            "gate": {
                "passed": true,
                "evaluated": true,
                "thresholds": {"minSuccessRate": 0.8},
                "violations": [],
                "warnings": []
            }
        })
    }

    #[test]
    fn consistent_baseline_is_clean() {
        let (projection, findings) = validate_baseline(&report(), &BaselineOptions::default());
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
        assert!(findings.warnings.is_empty());
        assert_eq!(projection.totals.map(|t| t.executions), Some(200));
        assert_eq!(projection.p95_duration_ms(), Some(6100.0));
        assert_eq!(projection.window.days, Some(7));
    }

    #[test]
    fn completed_short_of_its_parts_is_one_totals_mismatch() {
        let mut value = report();
        value["totals"]["completed"] = json!(176);
        value["totals"]["running"] = json!(19);
        value["rates"]["completedSuccessRate"] = json!(171.0 / 176.0);
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(findings.errors.len(), 1, "{:?}", findings.errors);
        assert!(findings.errors[0].contains("totals mismatch"));
        assert_eq!(classify(&findings.errors[0]), ReasonCode::TotalsMismatch);
    }

    #[test]
    fn each_rate_is_checked_against_its_ratio() {
        let mut value = report();
        value["rates"]["failedRate"] = json!(0.031);
        let (projection, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(
            findings.errors,
            vec!["rate mismatch: rates.failedRate expected 0.030000, actual 0.031"]
        );
        assert_eq!(classify(&findings.errors[0]), ReasonCode::RateMismatch);
        assert!(!projection.is_verified("rates.failedRate"));
        assert!(projection.is_verified("rates.successRate"));

        let mut value = report();
        value["rates"]["successRate"] = json!(0.855 + 5e-7);
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    }

    #[test]
    fn zero_executions_define_rates_as_zero() {
        let mut value = report();
        value["totals"] = json!({
            "executions": 0, "completed": 0, "running": 0, "pending": 0,
            "success": 0, "failed": 0, "canceled": 0, "timeoutFailures": 0
        });
        value["rates"] = json!({
            "successRate": 0, "failedRate": 0, "canceledRate": 0,
            "timeoutRate": 0, "completedSuccessRate": 0
        });
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
    }

    #[test]
    fn overflowing_totals_are_a_mismatch() {
        let mut value = report();
        value["totals"]["success"] = json!(u64::MAX);
        value["totals"]["failed"] = json!(1);
        value["totals"]["timeoutFailures"] = json!(0);
        value.as_object_mut().unwrap().remove("rates");
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(
            findings.errors,
            vec![
                "totals mismatch: success+failed+canceled overflows",
                "rates is missing",
            ]
        );
        assert_eq!(classify(&findings.errors[0]), ReasonCode::TotalsMismatch);
    }

    #[test]
    fn timeout_failures_cannot_exceed_failed() {
        let mut value = report();
        value["totals"]["timeoutFailures"] = json!(7);
        value["rates"]["timeoutRate"] = json!(0.035);
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(
            findings.errors,
            vec!["totals mismatch: timeoutFailures 7 exceeds failed 6"]
        );
    }

    #[test]
    fn latency_percentiles_must_be_ordered() {
        let mut value = report();
        value["latencyMs"]["p90"] = json!(7000);
        let (projection, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(
            findings.errors,
            vec!["percentile order violation: latencyMs.p90 7000 > latencyMs.p95 6100"]
        );
        assert_eq!(projection.unverified, vec!["latencyMs.p90", "latencyMs.p95"]);
    }

    #[test]
    fn passed_gate_with_violations_is_always_rejected() {
        let mut value = report();
        value["gate"]["violations"] = json!(["successRate below 0.9"]);
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(classify(&findings.errors[0]), ReasonCode::GateConsistencyViolation);
    }

    #[test]
    fn require_gate_pass_rejects_failed_or_unevaluated_gate() {
        let options = BaselineOptions {
            require_gate_pass: true,
            ..BaselineOptions::default()
        };
        let mut value = report();
        value["gate"]["passed"] = json!(false);
        value["gate"]["violations"] = json!(["p95 above 6000ms"]);
        let (_, findings) = validate_baseline(&value, &options);
        assert_eq!(
            findings.errors,
            vec!["gate not passed: 1 violation(s), first: p95 above 6000ms"]
        );

        value["gate"]["evaluated"] = json!(false);
        value["gate"]["violations"] = json!([]);
        let (_, findings) = validate_baseline(&value, &options);
        assert_eq!(findings.errors, vec!["gate not passed: gate was not evaluated"]);
        assert_eq!(classify(&findings.errors[0]), ReasonCode::GateNotPassed);
    }

    #[test]
    fn warnings_are_fatal_only_when_required() {
        let mut value = report();
        value["gate"]["warnings"] = json!(["window shorter than 7 days"]);
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert!(findings.errors.is_empty());
        assert_eq!(findings.warnings, vec!["gate warning: window shorter than 7 days"]);

        let options = BaselineOptions {
            require_no_warnings: true,
            ..BaselineOptions::default()
        };
        let (_, findings) = validate_baseline(&value, &options);
        assert_eq!(classify(&findings.errors[0]), ReasonCode::GateWarningsPresent);
    }

    #[test]
    fn mistyped_total_skips_rate_checks() {
        let mut value = report();
        value["totals"]["success"] = json!("171");
        value["rates"]["successRate"] = json!(0.5);
        let (projection, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(findings.errors, vec!["totals.success must be a non-negative integer"]);
        assert!(projection.totals.is_none());
        assert_eq!(projection.success_rate(), Some(0.5));
    }

    #[test]
    fn schema_version_mismatch_is_classified() {
        let mut value = report();
        value["schemaVersion"] = json!("2");
        let (_, findings) = validate_baseline(&value, &BaselineOptions::default());
        assert_eq!(findings.errors, vec!["schemaVersion mismatch: expected 1, actual 2"]);
        assert_eq!(classify(&findings.errors[0]), ReasonCode::ReportSchemaMismatch);
    }
}
