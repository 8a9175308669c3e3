//! Smoke run reports.

use super::fields::{Findings, Object};
use super::step::{validate_steps, StepProjection, StepsProjection};
use super::{check_counter, check_run_status, declared_quick_locate, default_schema_version, step_candidates};
use crate::fingerprint::{fingerprint, FailureFingerprint};
use crate::quick_locate::{check_declared, resolve_quick_locate, QuickLocateChain, QuickLocateResolution};
use crate::report::{RunStatus, SmokeMode, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeOptions {
    pub expected_schema_version: String,
    /// Reject reports produced in a different mode.
    pub expected_mode: Option<SmokeMode>,
    pub quick_locate_chain: QuickLocateChain,
}

impl Default for SmokeOptions {
    fn default() -> Self {
        Self {
            expected_schema_version: default_schema_version(),
            expected_mode: None,
            quick_locate_chain: QuickLocateChain::Summary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeSummaryCounters {
    pub total_steps: Option<u64>,
    pub successful_steps: Option<u64>,
    pub failed_steps: Option<u64>,
    pub total_retries: Option<u64>,
    pub failed_step_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokeProjection {
    pub schema_version: Option<String>,
    pub run_id: Option<String>,
    pub mode: Option<SmokeMode>,
    pub status: Option<RunStatus>,
    pub steps: Vec<StepProjection>,
    pub summary: SmokeSummaryCounters,
    pub fingerprint: Option<FailureFingerprint>,
    pub quick_locate: Option<QuickLocateResolution>,
}

pub fn validate_smoke(value: &Value, options: &SmokeOptions) -> (SmokeProjection, Findings) {
    let mut findings = Findings::new();
    let mut projection = SmokeProjection {
        schema_version: None,
        run_id: None,
        mode: None,
        status: None,
        steps: Vec::new(),
        summary: SmokeSummaryCounters::default(),
        fingerprint: None,
        quick_locate: None,
    };
    let Some(root) = findings.as_object(value, "") else {
        return (projection, findings);
    };

    projection.schema_version = findings.schema_version(root, &options.expected_schema_version);
    projection.run_id = findings.string(root, "", "runId").map(str::to_string);
    projection.mode = findings.enumerated::<SmokeMode>(root, "", "mode", "base|extended|gate");
    if let (Some(expected), Some(actual)) = (options.expected_mode, projection.mode) {
        if expected != actual {
            findings.error(format!(
                "mode mismatch: expected {}, actual {}",
                expected.as_str(),
                actual.as_str()
            ));
        }
    }
    projection.status = findings.enumerated::<RunStatus>(root, "", "status", "SUCCESS|FAILED");

    let steps = findings
        .non_empty_array(root, "", "steps")
        .map(|items| validate_steps(items, "steps", &mut findings));

    if let Some(summary) = findings.object(root, "", "summary") {
        projection.summary = read_summary(summary, &mut findings);
        let declared = declared_quick_locate(summary, "summary", &mut findings);
        if let Some(steps) = steps.as_ref().filter(|steps| steps.complete) {
            check_summary(&projection.summary, steps, &mut findings);
            check_run_status(&mut findings, projection.status, steps, false);

            let fp = fingerprint(&steps.outcomes());
            let resolution =
                resolve_quick_locate(options.quick_locate_chain, &step_candidates(steps, fp.as_ref()));
            if let Some(declared) = &declared {
                for error in check_declared(declared, &resolution) {
                    findings.error(error);
                }
            }
            projection.fingerprint = fp;
            projection.quick_locate = Some(resolution);
        }
    }

    if let Some(steps) = steps {
        projection.steps = steps.steps;
    }
    debug!(
        errors = findings.errors.len(),
        warnings = findings.warnings.len(),
        "validated smoke report"
    );
    (projection, findings)
}

fn read_summary(summary: &Object, findings: &mut Findings) -> SmokeSummaryCounters {
    SmokeSummaryCounters {
        total_steps: findings.count(summary, "summary", "totalSteps"),
        successful_steps: findings.count(summary, "summary", "successfulSteps"),
        failed_steps: findings.count(summary, "summary", "failedSteps"),
        total_retries: findings.count(summary, "summary", "totalRetries"),
        failed_step_name: findings
            .optional_string(summary, "summary", "failedStepName")
            .flatten()
            .map(str::to_string),
    }
}

fn check_summary(summary: &SmokeSummaryCounters, steps: &StepsProjection, findings: &mut Findings) {
    check_counter(findings, "summary.totalSteps", steps.steps.len() as u64, summary.total_steps);
    check_counter(
        findings,
        "summary.successfulSteps",
        steps.count_with(StepStatus::Success),
        summary.successful_steps,
    );
    check_counter(
        findings,
        "summary.failedSteps",
        steps.count_with(StepStatus::Failed),
        summary.failed_steps,
    );
    check_counter(findings, "summary.totalRetries", steps.total_retries(), summary.total_retries);

    let expected = steps.first_failed().and_then(|step| step.name.as_deref());
    let declared = summary.failed_step_name.as_deref();
    if expected != declared {
        findings.error(format!(
            "failedStepName mismatch: expected {}, actual {}",
            quoted_or_null(expected),
            quoted_or_null(declared)
        ));
    }
}

fn quoted_or_null(value: Option<&str>) -> String {
    value
        .map(|v| format!("'{}'", v))
        .unwrap_or_else(|| "null".to_string())
}
