//! Per-kind report validators.
//!
//! Every validator has the same shape: it takes the raw JSON value and its
//! options, and returns a normalized projection together with the
//! [`Findings`] it collected. Validators never fail; a defect becomes a
//! message and the affected projection field stays `None`.

pub mod baseline;
pub mod fields;
pub mod perf;
pub mod quality_gate;
pub mod smoke;
pub mod step;

pub use baseline::{validate_baseline, BaselineOptions, BaselineProjection};
pub use fields::Findings;
pub use perf::{validate_perf, PerfOptions, PerfProjection};
pub use quality_gate::{validate_quality_gate, QualityGateOptions, QualityGateProjection};
pub use smoke::{validate_smoke, SmokeOptions, SmokeProjection};

use crate::fingerprint::FailureFingerprint;
use crate::quick_locate::{DeclaredQuickLocate, QuickLocateCandidate, QuickLocateSource};
use crate::report::{RunStatus, StepStatus};
use fields::{field_path, Object};
use step::StepsProjection;

pub const DEFAULT_SCHEMA_VERSION: &str = "1";

pub(crate) fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

/// Compare a declared summary counter with the value derived from the steps.
pub(crate) fn check_counter(findings: &mut Findings, path: &str, derived: u64, declared: Option<u64>) {
    if let Some(declared) = declared {
        if declared != derived {
            findings.error(format!(
                "summary counter mismatch: {} expected {}, actual {}",
                path, derived, declared
            ));
        }
    }
}

/// `status` must be FAILED exactly when some step FAILED. `explained_failure`
/// allows a FAILED run without a failed step when the report names a reason.
pub(crate) fn check_run_status(
    findings: &mut Findings,
    status: Option<RunStatus>,
    steps: &StepsProjection,
    explained_failure: bool,
) {
    let failed = steps.count_with(StepStatus::Failed);
    match status {
        Some(RunStatus::Success) if failed > 0 => findings.error(format!(
            "status conflict: status SUCCESS but {} step(s) FAILED",
            failed
        )),
        Some(RunStatus::Failed) if failed == 0 && !explained_failure => {
            findings.error("status conflict: status FAILED but no step FAILED")
        }
        _ => {}
    }
}

/// Read an optional `quickLocate` block recorded in a report summary.
pub(crate) fn declared_quick_locate(
    summary: &Object,
    parent: &str,
    findings: &mut Findings,
) -> Option<DeclaredQuickLocate> {
    let value = summary.get("quickLocate")?;
    if value.is_null() {
        return None;
    }
    let path = field_path(parent, "quickLocate");
    let obj = findings.as_object(value, &path)?;
    let first_fix_route = findings.string(obj, &path, "firstFixRoute")?.to_string();
    let source = findings.optional_string(obj, &path, "source").flatten();
    let command = findings.optional_string(obj, &path, "command").flatten();
    Some(DeclaredQuickLocate {
        source: source.map(str::to_string),
        first_fix_route,
        command: command.map(str::to_string),
    })
}

/// Candidates every step-based report can offer: the step's own override,
/// the fingerprint, and the first failed step.
pub(crate) fn step_candidates(
    steps: &StepsProjection,
    fingerprint: Option<&FailureFingerprint>,
) -> Vec<QuickLocateCandidate> {
    let mut candidates = Vec::new();
    let first_failed = steps.first_failed();

    if let Some(ql) = first_failed.and_then(|step| step.quick_locate.as_ref()) {
        candidates.push(QuickLocateCandidate::new(
            QuickLocateSource::StepOverride,
            ql.command.as_deref(),
            ql.first_failed_output.as_deref(),
        ));
    }
    if let Some(fp) = fingerprint {
        candidates.push(QuickLocateCandidate::new(
            QuickLocateSource::FailureFingerprint,
            fp.command.as_deref(),
            Some(fp.first_output_line.as_str()),
        ));
    }
    if let Some(step) = first_failed {
        candidates.push(QuickLocateCandidate::new(
            QuickLocateSource::FailedStep,
            step.command.as_deref(),
            step.first_output_line.as_deref(),
        ));
    }
    candidates
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn step(id: &str, status: &str, exit_codes: &[i64]) -> Value {
        let attempts: Vec<Value> = exit_codes
            .iter()
            .enumerate()
            .map(|(idx, code)| json!({"attempt": idx + 1, "exitCode": code, "durationMs": 250}))
            .collect();
        json!({
            "id": id,
            "name": format!("Step {}", id),
            "command": format!("npm run {}", id),
            "status": status,
            "attempts": attempts,
            "retryCount": exit_codes.len() - 1,
        })
    }

    pub fn failed_step(id: &str, output: &str) -> Value {
        let mut value = step(id, "FAILED", &[1]);
        value["output"] = json!(output);
        value
    }
}
