//! Quality-gate reports: the umbrella run that executes the other checks and
//! records where each artifact was written.

use super::fields::{field_path, Findings, Object};
use super::step::{validate_steps, StepProjection, StepsProjection};
use super::{check_counter, check_run_status, declared_quick_locate, default_schema_version, step_candidates};
use crate::fingerprint::{fingerprint, FailureFingerprint};
use crate::guidance::{check_totals, DiagnosticsTotals, ReasonCode};
use crate::quick_locate::{
    check_declared, resolve_quick_locate, QuickLocateCandidate, QuickLocateChain, QuickLocateResolution,
    QuickLocateSource,
};
use crate::report::{RunStatus, StepStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Component, Path};
use tracing::debug;

/// Step the quality gate runs to assert its own summary JSON.
pub const SUMMARY_JSON_ASSERT_STEP_ID: &str = "quality:summary-json-assert";

/// Artifact locations the caller expects the report to have recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtifacts {
    pub smoke_report_path: Option<String>,
    pub perf_report_path: Option<String>,
    pub summary_markdown_path: Option<String>,
    pub summary_json_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateOptions {
    pub expected_schema_version: String,
    /// Where the report was read from; must equal `artifacts.selfReportPath`.
    pub report_path: Option<String>,
    pub expected_artifacts: ExpectedArtifacts,
}

impl Default for QualityGateOptions {
    fn default() -> Self {
        Self {
            expected_schema_version: default_schema_version(),
            report_path: None,
            expected_artifacts: ExpectedArtifacts::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityArtifacts {
    pub smoke_report_path: Option<String>,
    pub perf_report_path: Option<String>,
    pub summary_markdown_path: Option<String>,
    pub summary_json_path: Option<String>,
    pub self_report_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureIndexEntry {
    pub step_id: Option<String>,
    pub reason_code: Option<ReasonCode>,
    pub suggested_command: Option<String>,
    pub first_validation_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateSummary {
    pub total_steps: Option<u64>,
    pub successful_steps: Option<u64>,
    pub failed_steps: Option<u64>,
    pub failed_step_ids: Option<Vec<String>>,
    pub failure_reason_code: Option<String>,
    pub failure_index: Vec<FailureIndexEntry>,
    pub failure_fingerprint: Option<FailureFingerprint>,
    pub diagnostics: Option<DiagnosticsTotals>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateProjection {
    pub schema_version: Option<String>,
    pub run_id: Option<String>,
    pub status: Option<RunStatus>,
    pub artifacts: QualityArtifacts,
    pub steps: Vec<StepProjection>,
    pub summary: QualityGateSummary,
    /// Recomputed from the steps.
    pub fingerprint: Option<FailureFingerprint>,
    pub quick_locate: Option<QuickLocateResolution>,
    /// Diagnostics totals implied by the failure index.
    pub diagnostics: Option<DiagnosticsTotals>,
}

pub fn validate_quality_gate(
    value: &Value,
    options: &QualityGateOptions,
) -> (QualityGateProjection, Findings) {
    let mut findings = Findings::new();
    let mut projection = QualityGateProjection::default();
    let Some(root) = findings.as_object(value, "") else {
        return (projection, findings);
    };

    projection.schema_version = findings.schema_version(root, &options.expected_schema_version);
    projection.run_id = findings.string(root, "", "runId").map(str::to_string);
    projection.status = findings.enumerated::<RunStatus>(root, "", "status", "SUCCESS|FAILED");

    if let Some(artifacts) = findings.object(root, "", "artifacts") {
        projection.artifacts = read_artifacts(artifacts, &mut findings);
        check_artifacts(&projection.artifacts, options, &mut findings);
    }

    let steps = findings
        .array(root, "", "steps")
        .map(|items| validate_steps(items, "steps", &mut findings));

    if let (Some(_), Some(steps)) = (projection.artifacts.summary_json_path.as_deref(), &steps) {
        if !steps.contains_id(SUMMARY_JSON_ASSERT_STEP_ID) {
            findings.error(format!(
                "summary json assert step {} is required when artifacts.summaryJsonPath is set",
                SUMMARY_JSON_ASSERT_STEP_ID
            ));
        }
    }

    if let Some(summary) = findings.object(root, "", "summary") {
        let (read, index_complete) = read_summary(summary, &mut findings);
        projection.summary = read;
        let declared_ql = declared_quick_locate(summary, "summary", &mut findings);
        let explicit_code = projection.summary.failure_reason_code.as_deref().and_then(|raw| {
            let parsed = raw.parse::<ReasonCode>().ok();
            if parsed.is_none() {
                findings.warn(format!("summary.failureReasonCode '{}' is not a known reason code", raw));
            }
            parsed
        });

        if index_complete {
            let expected_totals = expected_diagnostics(&projection.summary.failure_index, explicit_code);
            if let Some(declared) = &projection.summary.diagnostics {
                for reason in check_totals(&expected_totals, declared) {
                    findings.error(format!("summary.diagnostics.{}", reason));
                }
            }
            projection.diagnostics = Some(expected_totals);
        }

        if let Some(steps) = &steps {
            check_failure_index_steps(&projection.summary.failure_index, steps, &mut findings);
        }

        if let Some(steps) = steps.as_ref().filter(|steps| steps.complete) {
            check_summary(&projection.summary, steps, &mut findings);
            check_run_status(
                &mut findings,
                projection.status,
                steps,
                projection.summary.failure_reason_code.is_some(),
            );

            let computed = fingerprint(&steps.outcomes());
            compare_fingerprints(
                projection.summary.failure_fingerprint.as_ref(),
                computed.as_ref(),
                &mut findings,
            );

            let declared_fp = projection.summary.failure_fingerprint.as_ref().or(computed.as_ref());
            let mut candidates = Vec::new();
            if let Some(entry) = projection.summary.failure_index.first() {
                candidates.push(QuickLocateCandidate::new(
                    QuickLocateSource::ValidationFailureIndex,
                    entry.suggested_command.as_deref(),
                    entry.first_validation_error.as_deref(),
                ));
            }
            candidates.extend(step_candidates(steps, declared_fp));
            let resolution = resolve_quick_locate(QuickLocateChain::QualityGate, &candidates);
            if let Some(declared) = &declared_ql {
                for error in check_declared(declared, &resolution) {
                    findings.error(error);
                }
            }

            projection.fingerprint = computed;
            projection.quick_locate = Some(resolution);
        }
    }

    if let Some(steps) = steps {
        projection.steps = steps.steps;
    }
    debug!(
        run_id = projection.run_id.as_deref().unwrap_or("-"),
        errors = findings.errors.len(),
        warnings = findings.warnings.len(),
        "validated quality-gate report"
    );
    (projection, findings)
}

fn read_artifacts(artifacts: &Object, findings: &mut Findings) -> QualityArtifacts {
    let optional = |key: &str, findings: &mut Findings| {
        findings
            .optional_string(artifacts, "artifacts", key)
            .flatten()
            .filter(|path| !path.trim().is_empty())
            .map(str::to_string)
    };
    QualityArtifacts {
        smoke_report_path: optional("smokeReportPath", findings),
        perf_report_path: optional("perfReportPath", findings),
        summary_markdown_path: optional("summaryMarkdownPath", findings),
        summary_json_path: optional("summaryJsonPath", findings),
        self_report_path: findings
            .string(artifacts, "artifacts", "selfReportPath")
            .map(str::to_string),
    }
}

fn check_artifacts(artifacts: &QualityArtifacts, options: &QualityGateOptions, findings: &mut Findings) {
    if let (Some(expected), Some(actual)) = (
        options.report_path.as_deref(),
        artifacts.self_report_path.as_deref(),
    ) {
        if !same_path(expected, actual) {
            findings.error(format!(
                "report path mismatch: artifacts.selfReportPath '{}', report was read from '{}'",
                actual, expected
            ));
        }
    }

    let expected = &options.expected_artifacts;
    let pairs = [
        ("smokeReportPath", &expected.smoke_report_path, &artifacts.smoke_report_path),
        ("perfReportPath", &expected.perf_report_path, &artifacts.perf_report_path),
        (
            "summaryMarkdownPath",
            &expected.summary_markdown_path,
            &artifacts.summary_markdown_path,
        ),
        ("summaryJsonPath", &expected.summary_json_path, &artifacts.summary_json_path),
    ];
    for (key, expected, actual) in pairs {
        let Some(expected) = expected.as_deref() else {
            continue;
        };
        let matches = actual.as_deref().is_some_and(|actual| same_path(expected, actual));
        if !matches {
            findings.error(format!(
                "artifact path mismatch: {} expected '{}', actual {}",
                field_path("artifacts", key),
                expected,
                actual
                    .as_deref()
                    .map(|a| format!("'{}'", a))
                    .unwrap_or_else(|| "null".to_string())
            ));
        }
    }
}

/// Paths are equal when their components are, ignoring `.` segments.
fn same_path(a: &str, b: &str) -> bool {
    fn components(p: &str) -> Vec<Component<'_>> {
        Path::new(p.trim())
            .components()
            .filter(|c| *c != Component::CurDir)
            .collect()
    }
    components(a) == components(b)
}

/// The flag is false when some failure-index entry could not be read, so
/// totals derived from the index are not trustworthy.
fn read_summary(summary: &Object, findings: &mut Findings) -> (QualityGateSummary, bool) {
    let (failure_index, index_complete) = read_failure_index(summary, findings);
    let read = QualityGateSummary {
        total_steps: findings.count(summary, "summary", "totalSteps"),
        successful_steps: findings.count(summary, "summary", "successfulSteps"),
        failed_steps: findings.count(summary, "summary", "failedSteps"),
        failed_step_ids: findings.string_list(summary, "summary", "failedStepIds"),
        failure_reason_code: findings
            .optional_string(summary, "summary", "failureReasonCode")
            .flatten()
            .filter(|code| !code.trim().is_empty())
            .map(|code| code.trim().to_string()),
        failure_index,
        failure_fingerprint: read_declared_fingerprint(summary, findings),
        diagnostics: read_declared_diagnostics(summary, findings),
    };
    (read, index_complete)
}

fn read_failure_index(summary: &Object, findings: &mut Findings) -> (Vec<FailureIndexEntry>, bool) {
    if summary.get("failureIndex").is_none_or(Value::is_null) {
        return (Vec::new(), true);
    }
    let Some(items) = findings.array(summary, "summary", "failureIndex") else {
        return (Vec::new(), false);
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut complete = true;
    for (idx, item) in items.iter().enumerate() {
        let path = format!("summary.failureIndex[{}]", idx);
        let Some(obj) = findings.as_object(item, &path) else {
            complete = false;
            continue;
        };
        let step_id = findings.string(obj, &path, "stepId").map(str::to_string);
        let reason_code = findings.enumerated::<ReasonCode>(obj, &path, "reasonCode", "the known reason codes");
        let suggested_command = findings
            .optional_string(obj, &path, "suggestedCommand")
            .flatten()
            .map(str::to_string);
        let first_validation_error = findings
            .optional_string(obj, &path, "firstValidationError")
            .flatten()
            .map(str::to_string);
        entries.push(FailureIndexEntry {
            step_id,
            reason_code,
            suggested_command,
            first_validation_error,
        });
    }
    (entries, complete)
}

fn read_declared_fingerprint(summary: &Object, findings: &mut Findings) -> Option<FailureFingerprint> {
    let value = summary.get("failureFingerprint")?;
    if value.is_null() {
        return None;
    }
    let path = "summary.failureFingerprint";
    let obj = findings.as_object(value, path)?;

    let step_id = findings.string(obj, path, "stepId");
    let command = findings.optional_string(obj, path, "command");
    let exit_code = match obj.get("exitCode") {
        None | Some(Value::Null) => Some(None),
        Some(_) => findings.integer(obj, path, "exitCode").map(Some),
    };
    let first_output_line = findings.optional_string(obj, path, "firstOutputLine");
    let signature = findings.string(obj, path, "signature");
    let hash_algorithm = findings.string(obj, path, "hashAlgorithm");
    let hash = findings.string(obj, path, "hash");

    Some(FailureFingerprint {
        step_id: step_id?.to_string(),
        command: command?.map(str::to_string),
        exit_code: exit_code?,
        first_output_line: first_output_line?.unwrap_or_default().to_string(),
        signature: signature?.to_string(),
        hash_algorithm: hash_algorithm?.to_string(),
        hash: hash?.to_string(),
    })
}

fn read_declared_diagnostics(summary: &Object, findings: &mut Findings) -> Option<DiagnosticsTotals> {
    let value = summary.get("diagnostics")?;
    if value.is_null() {
        return None;
    }
    let path = "summary.diagnostics";
    let obj = findings.as_object(value, path)?;
    let codes = findings.count(obj, path, "reasonCodeCountTotal");
    let sources = findings.count(obj, path, "reasonCodeSourceCountTotal");
    Some(DiagnosticsTotals {
        reason_code_count_total: usize::try_from(codes?).ok()?,
        reason_code_source_count_total: usize::try_from(sources?).ok()?,
    })
}

/// One reason code and one source per failure-index entry, plus the explicit code.
fn expected_diagnostics(index: &[FailureIndexEntry], explicit: Option<ReasonCode>) -> DiagnosticsTotals {
    let total = index.len() + usize::from(explicit.is_some());
    DiagnosticsTotals {
        reason_code_count_total: total,
        reason_code_source_count_total: total,
    }
}

fn check_failure_index_steps(index: &[FailureIndexEntry], steps: &StepsProjection, findings: &mut Findings) {
    for (idx, entry) in index.iter().enumerate() {
        if let Some(step_id) = entry.step_id.as_deref() {
            if !steps.contains_id(step_id) {
                findings.error(format!(
                    "summary.failureIndex[{}].stepId '{}' does not match any step",
                    idx, step_id
                ));
            }
        }
    }
}

fn check_summary(summary: &QualityGateSummary, steps: &StepsProjection, findings: &mut Findings) {
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

    if let Some(declared) = &summary.failed_step_ids {
        let expected = steps.failed_ids();
        if *declared != expected {
            findings.error(format!(
                "failedStepIds mismatch: expected [{}], actual [{}]",
                expected.join(", "),
                declared.join(", ")
            ));
        }
    }
}

fn compare_fingerprints(
    declared: Option<&FailureFingerprint>,
    computed: Option<&FailureFingerprint>,
    findings: &mut Findings,
) {
    match (declared, computed) {
        (Some(declared), Some(computed)) => {
            let fields = [
                ("stepId", &declared.step_id, &computed.step_id),
                ("hashAlgorithm", &declared.hash_algorithm, &computed.hash_algorithm),
                ("signature", &declared.signature, &computed.signature),
                ("hash", &declared.hash, &computed.hash),
            ];
            if let Some((name, declared, computed)) = fields.iter().find(|(_, d, c)| d != c) {
                findings.error(format!(
                    "failure fingerprint mismatch: {} declared '{}', computed '{}'",
                    name, declared, computed
                ));
            }
        }
        (Some(declared), None) => findings.error(format!(
            "failure fingerprint mismatch: declared for step '{}' but no step FAILED",
            declared.step_id
        )),
        (None, Some(computed)) => findings.warn(format!(
            "summary.failureFingerprint is missing; step '{}' FAILED with hash {}",
            computed.step_id, computed.hash
        )),
        (None, None) => {}
    }
}
