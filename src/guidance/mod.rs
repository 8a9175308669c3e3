//! Failure guidance: reason code, suggested action and a runnable command.
//!
//! Guidance is resolved from an explicit reason code when one is supplied,
//! otherwise from the first validation error via [`classify`]. Commands are
//! rendered from fixed templates whose paths resolve override → context →
//! built-in default, so the emitted command runs without further editing.

pub mod classify;

pub use classify::{classify, is_reference_scoped, ReasonCode, ReasonCodeSource};

use crate::report::ReportKind;
use crate::util::{collapse_whitespace, truncate, NOT_AVAILABLE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_SNAPSHOT_MAX_CHARS: usize = 320;

/// Artifact files a remediation command may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKey {
    SmokeReport,
    PerfReport,
    BaselineReport,
    ReferenceReport,
    QualityReport,
    SummaryJson,
    SummaryMarkdown,
    Thresholds,
}

impl ArtifactKey {
    pub fn default_path(&self) -> &'static str {
        match self {
            ArtifactKey::SmokeReport => "artifacts/smoke-report.json",
            ArtifactKey::PerfReport => "artifacts/perf-report.json",
            ArtifactKey::BaselineReport => "artifacts/execution-baseline.json",
            ArtifactKey::ReferenceReport => "artifacts/execution-baseline.reference.json",
            ArtifactKey::QualityReport => "artifacts/quality-gate-report.json",
            ArtifactKey::SummaryJson => "artifacts/quality-summary.json",
            ArtifactKey::SummaryMarkdown => "artifacts/quality-summary.md",
            ArtifactKey::Thresholds => "quality-thresholds.toml",
        }
    }

    pub fn for_report(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Smoke => ArtifactKey::SmokeReport,
            ReportKind::Perf => ArtifactKey::PerfReport,
            ReportKind::ExecutionBaseline => ArtifactKey::BaselineReport,
            ReportKind::QualityGate => ArtifactKey::QualityReport,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths(pub BTreeMap<ArtifactKey, String>);

impl ArtifactPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: ArtifactKey, path: impl Into<String>) -> Self {
        self.set(key, path);
        self
    }

    pub fn set(&mut self, key: ArtifactKey, path: impl Into<String>) {
        let path = path.into();
        if !path.trim().is_empty() {
            self.0.insert(key, path);
        }
    }

    pub fn get(&self, key: ArtifactKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }
}

/// Resolves artifact paths: explicit override, then context, then default.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    pub overrides: &'a ArtifactPaths,
    pub context: &'a ArtifactPaths,
}

impl PathResolver<'_> {
    pub fn resolve(&self, key: ArtifactKey) -> String {
        self.overrides
            .get(key)
            .or_else(|| self.context.get(key))
            .unwrap_or_else(|| key.default_path())
            .to_string()
    }

    fn arg(&self, key: ArtifactKey) -> String {
        shell_quote(&self.resolve(key))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GuidanceRequest<'a> {
    pub report_kind: ReportKind,
    pub failure_reason_code: Option<&'a str>,
    pub first_validation_error: Option<&'a str>,
    /// How many validation errors the run produced.
    pub validation_error_count: usize,
    pub paths: PathResolver<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceRecord {
    pub reason_code: Option<ReasonCode>,
    pub reason_code_source: ReasonCodeSource,
    pub first_validation_error: Option<String>,
    pub suggested_action: String,
    pub suggested_command: String,
    #[serde(default)]
    pub validation_error_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl GuidanceRecord {
    pub fn none() -> Self {
        Self {
            reason_code: None,
            reason_code_source: ReasonCodeSource::None,
            first_validation_error: None,
            suggested_action: NOT_AVAILABLE.to_string(),
            suggested_command: NOT_AVAILABLE.to_string(),
            validation_error_count: 0,
            notes: Vec::new(),
        }
    }

    /// The reason code, only when it was supplied explicitly.
    pub fn explicit_code(&self) -> Option<ReasonCode> {
        match self.reason_code_source {
            ReasonCodeSource::ExplicitFailureReasonCode => self.reason_code,
            _ => None,
        }
    }
}

pub fn resolve_guidance(request: &GuidanceRequest<'_>) -> GuidanceRecord {
    let mut notes = Vec::new();
    let first_error = request
        .first_validation_error
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let explicit = request
        .failure_reason_code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .and_then(|raw| match raw.parse::<ReasonCode>() {
            Ok(code) => Some(code),
            Err(error) => {
                warn!(code = raw, "ignoring unknown explicit failure reason code");
                notes.push(format!("{}; classified from validation error instead", error));
                None
            }
        });

    let (code, source) = match (explicit, first_error) {
        (Some(code), _) => (code, ReasonCodeSource::ExplicitFailureReasonCode),
        (None, Some(message)) => (classify(message), ReasonCodeSource::ClassifiedFromValidationError),
        (None, None) => {
            let mut record = GuidanceRecord::none();
            record.validation_error_count = request.validation_error_count;
            record.notes = notes;
            return record;
        }
    };

    // Classified errors about the reference baseline point their command at it.
    let subject = match (source, first_error) {
        (ReasonCodeSource::ClassifiedFromValidationError, Some(message)) if is_reference_scoped(message) => {
            ArtifactKey::ReferenceReport
        }
        _ => ArtifactKey::for_report(request.report_kind),
    };
    let (action, command) = remediation_for(code, request.report_kind, subject, &request.paths);
    debug!(reason_code = %code, source = source.as_str(), "resolved failure guidance");

    GuidanceRecord {
        reason_code: Some(code),
        reason_code_source: source,
        first_validation_error: first_error.map(str::to_string),
        suggested_action: action,
        suggested_command: command,
        validation_error_count: request.validation_error_count,
        notes,
    }
}

/// Action and command for a reason code. Total over [`ReasonCode`].
pub fn remediation(code: ReasonCode, kind: ReportKind, paths: &PathResolver<'_>) -> (String, String) {
    remediation_for(code, kind, ArtifactKey::for_report(kind), paths)
}

/// Like [`remediation`], with report-level commands aimed at `subject`.
/// Baseline commands follow the subject when it is the reference baseline.
pub fn remediation_for(
    code: ReasonCode,
    kind: ReportKind,
    subject: ArtifactKey,
    paths: &PathResolver<'_>,
) -> (String, String) {
    let report = paths.arg(subject);
    let quality = paths.arg(ArtifactKey::QualityReport);
    let current = paths.arg(ArtifactKey::BaselineReport);
    let baseline = match subject {
        ArtifactKey::ReferenceReport => paths.arg(ArtifactKey::ReferenceReport),
        _ => current.clone(),
    };
    let perf = paths.arg(ArtifactKey::PerfReport);

    let (action, command) = match code {
        ReasonCode::ReportSchemaMismatch => (
            "Regenerate the report with the current producer or update the expected schema version",
            format!("jq -r '.schemaVersion' {}", report),
        ),
        ReasonCode::ReportPathMismatch => (
            "Point artifacts.selfReportPath at the file the quality-gate report was written to",
            format!("jq -r '.artifacts.selfReportPath' {}", quality),
        ),
        ReasonCode::ArtifactOptionsPathMismatch => (
            "Align the artifact paths recorded in the report with the paths passed to the validator",
            format!("jq '.artifacts' {}", quality),
        ),
        ReasonCode::SummaryJsonAssertRequired => (
            "Run the summary JSON assertion step and record it in the quality-gate report",
            format!(
                "gatecheck quality-gate --report {} --summary-json {}",
                quality,
                paths.arg(ArtifactKey::SummaryJson)
            ),
        ),
        ReasonCode::FailedStepIdsMismatch => (
            "Rebuild summary.failedStepIds from the FAILED steps in execution order",
            format!(
                "jq '{{declared: .summary.failedStepIds, actual: [.steps[] | select(.status == \"FAILED\") | .id]}}' {}",
                report
            ),
        ),
        ReasonCode::SummaryCounterMismatch => (
            "Recompute the summary counters from the recorded steps",
            format!(
                "jq '{{summary: .summary, steps: [.steps[] | {{id, status, retryCount}}]}}' {}",
                report
            ),
        ),
        ReasonCode::StatusStepConflict => (
            "Make the overall status agree with the step outcomes",
            format!(
                "jq '{{status: .status, steps: [.steps[] | {{id, status}}]}}' {}",
                report
            ),
        ),
        ReasonCode::ReportReadError => (
            "Check that the report file exists and contains valid JSON",
            format!("jq empty {}", report),
        ),
        ReasonCode::TotalsMismatch => (
            "Recount execution totals for the baseline window",
            format!("jq '.totals' {}", baseline),
        ),
        ReasonCode::RateMismatch => (
            "Recompute the baseline rates from the recorded totals",
            format!("jq '{{totals: .totals, rates: .rates}}' {}", baseline),
        ),
        ReasonCode::PercentileOrderViolation => (
            "Recompute latency percentiles so that lower percentiles never exceed higher ones",
            format!("jq '.latencyMs // .metrics' {}", report),
        ),
        ReasonCode::GateConsistencyViolation => (
            "Re-evaluate the baseline gate so gate.passed agrees with its violations",
            format!("jq '.gate' {}", baseline),
        ),
        ReasonCode::GateNotPassed => (
            "Fix the gate violations recorded in the execution baseline",
            format!("jq '.gate.violations' {}", baseline),
        ),
        ReasonCode::GateWarningsPresent => (
            "Resolve the gate warnings or rerun without requiring a warning-free gate",
            format!("jq '.gate.warnings' {}", baseline),
        ),
        ReasonCode::PerfScenarioMissing => (
            "Rerun the benchmark suite with every required scenario enabled",
            format!("jq '[.metrics[].id]' {}", perf),
        ),
        ReasonCode::PerfThresholdViolation => (
            "Investigate the scenarios exceeding their latency limits",
            format!("jq '.thresholdCheck' {}", perf),
        ),
        ReasonCode::FailureFingerprintMismatch => (
            "Recompute the failure fingerprint from the first failed step",
            format!("jq '.summary.failureFingerprint' {}", quality),
        ),
        ReasonCode::QuickLocateRouteMismatch => (
            "Update the recorded quick-locate route to the one the resolver computes",
            format!("jq '.summary.quickLocate' {}", report),
        ),
        ReasonCode::DiagnosticsTotalsMismatch => (
            "Regenerate the diagnostics block so its totals match the classified errors",
            format!("jq '.summary.diagnostics' {}", quality),
        ),
        ReasonCode::TrendReferenceMissing => (
            "Promote a known-good execution baseline to the reference path",
            format!("cp {} {}", current, paths.arg(ArtifactKey::ReferenceReport)),
        ),
        ReasonCode::TrendRegression => (
            "Compare the current baseline against the reference and fix the regressed metric",
            format!(
                "gatecheck trend --current {} --reference {} --thresholds {}",
                current,
                paths.arg(ArtifactKey::ReferenceReport),
                paths.arg(ArtifactKey::Thresholds)
            ),
        ),
        ReasonCode::ValidationError => (
            "Rerun validation and fix the reported fields",
            format!("gatecheck {} --report {}", cli_subcommand(kind), report),
        ),
    };
    (action.to_string(), command)
}

fn cli_subcommand(kind: ReportKind) -> &'static str {
    match kind {
        ReportKind::Smoke => "smoke",
        ReportKind::Perf => "perf",
        ReportKind::ExecutionBaseline => "baseline",
        ReportKind::QualityGate => "quality-gate",
    }
}

/// Quote a path for POSIX shells when it contains anything beyond plain path characters.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '='));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsTotals {
    pub reason_code_count_total: usize,
    pub reason_code_source_count_total: usize,
}

/// Compact one-line rendering of a guidance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceSnapshot {
    pub line: String,
    pub truncated: bool,
    pub length: usize,
    pub max_length: usize,
    pub reason_code_count_total: usize,
    pub reason_code_source_count_total: usize,
}

impl GuidanceSnapshot {
    pub fn totals(&self) -> DiagnosticsTotals {
        DiagnosticsTotals {
            reason_code_count_total: self.reason_code_count_total,
            reason_code_source_count_total: self.reason_code_source_count_total,
        }
    }
}

/// Totals come from the record alone: one code and one source per validation
/// error it was resolved over, plus the explicit code. The aggregate counts the
/// error list itself, so comparing the two catches a record resolved over a
/// different run.
pub fn snapshot(record: &GuidanceRecord, max_length: usize) -> GuidanceSnapshot {
    let code = record
        .reason_code
        .map(|c| c.as_str())
        .unwrap_or(NOT_AVAILABLE);
    let full = collapse_whitespace(&format!(
        "reasonCode={};source={};action={};command={};firstValidationError={}",
        code,
        record.reason_code_source.as_str(),
        record.suggested_action,
        record.suggested_command,
        record.first_validation_error.as_deref().unwrap_or(NOT_AVAILABLE),
    ));
    let length = full.chars().count();

    let explicit = usize::from(record.reason_code_source == ReasonCodeSource::ExplicitFailureReasonCode);
    let total = record.validation_error_count + explicit;

    GuidanceSnapshot {
        line: truncate(&full, max_length),
        truncated: length > max_length,
        length,
        max_length,
        reason_code_count_total: total,
        reason_code_source_count_total: total,
    }
}

/// Reason-code frequency tables over every validation error of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsAggregate {
    pub validation_error_count: usize,
    pub reason_code_counts: BTreeMap<ReasonCode, usize>,
    pub reason_code_source_counts: BTreeMap<ReasonCodeSource, usize>,
    pub reason_code_count_total: usize,
    pub reason_code_source_count_total: usize,
}

impl DiagnosticsAggregate {
    pub fn totals(&self) -> DiagnosticsTotals {
        DiagnosticsTotals {
            reason_code_count_total: self.reason_code_count_total,
            reason_code_source_count_total: self.reason_code_source_count_total,
        }
    }
}

pub fn aggregate_diagnostics(explicit: Option<ReasonCode>, errors: &[String]) -> DiagnosticsAggregate {
    let mut aggregate = DiagnosticsAggregate {
        validation_error_count: errors.len(),
        ..DiagnosticsAggregate::default()
    };

    if let Some(code) = explicit {
        *aggregate.reason_code_counts.entry(code).or_insert(0) += 1;
        *aggregate
            .reason_code_source_counts
            .entry(ReasonCodeSource::ExplicitFailureReasonCode)
            .or_insert(0) += 1;
    }
    for error in errors {
        *aggregate.reason_code_counts.entry(classify(error)).or_insert(0) += 1;
        *aggregate
            .reason_code_source_counts
            .entry(ReasonCodeSource::ClassifiedFromValidationError)
            .or_insert(0) += 1;
    }

    aggregate.reason_code_count_total = aggregate.reason_code_counts.values().sum();
    aggregate.reason_code_source_count_total = aggregate.reason_code_source_counts.values().sum();
    aggregate
}

/// Named mismatch reasons between the aggregator's totals and another source.
pub fn check_totals(expected: &DiagnosticsTotals, actual: &DiagnosticsTotals) -> Vec<String> {
    let mut reasons = Vec::new();
    if expected.reason_code_count_total != actual.reason_code_count_total {
        reasons.push(format!(
            "reasonCodeCountTotal mismatch: expected {}, actual {}",
            expected.reason_code_count_total, actual.reason_code_count_total
        ));
    }
    if expected.reason_code_source_count_total != actual.reason_code_source_count_total {
        reasons.push(format!(
            "reasonCodeSourceCountTotal mismatch: expected {}, actual {}",
            expected.reason_code_source_count_total, actual.reason_code_source_count_total
        ));
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        kind: ReportKind,
        code: Option<&'a str>,
        error: Option<&'a str>,
        overrides: &'a ArtifactPaths,
        context: &'a ArtifactPaths,
    ) -> GuidanceRequest<'a> {
        GuidanceRequest {
            report_kind: kind,
            failure_reason_code: code,
            first_validation_error: error,
            validation_error_count: usize::from(error.is_some()),
            paths: PathResolver { overrides, context },
        }
    }

    #[test]
    fn explicit_reason_code_overrides_classification() {
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::QualityGate,
            Some("REPORT_PATH_MISMATCH"),
            Some("schemaVersion mismatch: expected 1, actual 2"),
            &empty,
            &empty,
        ));
        assert_eq!(record.reason_code, Some(ReasonCode::ReportPathMismatch));
        assert_eq!(
            record.reason_code_source,
            ReasonCodeSource::ExplicitFailureReasonCode
        );
        assert_eq!(
            record.suggested_command,
            "jq -r '.artifacts.selfReportPath' artifacts/quality-gate-report.json"
        );
    }

    #[test]
    fn first_error_is_classified_without_explicit_code() {
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::Smoke,
            None,
            Some("schemaVersion mismatch: expected 1, actual 2"),
            &empty,
            &empty,
        ));
        assert_eq!(record.reason_code, Some(ReasonCode::ReportSchemaMismatch));
        assert_eq!(
            record.reason_code_source,
            ReasonCodeSource::ClassifiedFromValidationError
        );
        assert_eq!(
            record.suggested_command,
            "jq -r '.schemaVersion' artifacts/smoke-report.json"
        );
    }

    #[test]
    fn no_failure_yields_neutral_record() {
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(ReportKind::Perf, None, None, &empty, &empty));
        assert_eq!(record, GuidanceRecord::none());
        assert_eq!(record.suggested_action, "N/A");
        assert_eq!(record.suggested_command, "N/A");
    }

    #[test]
    fn unknown_explicit_code_falls_back_to_classification_with_note() {
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::ExecutionBaseline,
            Some("SOMETHING_NEW"),
            Some("totals mismatch: totals.completed (1) != success+failed+canceled (2)"),
            &empty,
            &empty,
        ));
        assert_eq!(record.reason_code, Some(ReasonCode::TotalsMismatch));
        assert_eq!(record.notes.len(), 1);
    }

    #[test]
    fn paths_resolve_override_then_context_then_default() {
        let overrides = ArtifactPaths::new().with(ArtifactKey::BaselineReport, "override/base.json");
        let context = ArtifactPaths::new()
            .with(ArtifactKey::BaselineReport, "ctx/base.json")
            .with(ArtifactKey::ReferenceReport, "ctx/ref.json");
        let resolver = PathResolver {
            overrides: &overrides,
            context: &context,
        };
        assert_eq!(resolver.resolve(ArtifactKey::BaselineReport), "override/base.json");
        assert_eq!(resolver.resolve(ArtifactKey::ReferenceReport), "ctx/ref.json");
        assert_eq!(
            resolver.resolve(ArtifactKey::Thresholds),
            "quality-thresholds.toml"
        );

        let (_, command) = remediation(ReasonCode::TrendReferenceMissing, ReportKind::ExecutionBaseline, &resolver);
        assert_eq!(command, "cp override/base.json ctx/ref.json");
    }

    #[test]
    fn every_reason_code_has_action_and_command() {
        let empty = ArtifactPaths::new();
        let resolver = PathResolver {
            overrides: &empty,
            context: &empty,
        };
        for kind in ReportKind::ALL {
            for code in ReasonCode::ALL {
                let (action, command) = remediation(code, kind, &resolver);
                assert!(!action.is_empty() && action != "N/A", "{}", code);
                assert!(!command.is_empty() && command != "N/A", "{}", code);
            }
        }
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        assert_eq!(shell_quote("artifacts/a.json"), "artifacts/a.json");
        assert_eq!(shell_quote("my dir/a.json"), "'my dir/a.json'");
        assert_eq!(shell_quote("it's.json"), r"'it'\''s.json'");
    }

    #[test]
    fn snapshot_truncates_to_cap_and_keeps_length() {
        let long_error = format!("schemaVersion mismatch: {}", "x".repeat(400));
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::Smoke,
            None,
            Some(&long_error),
            &empty,
            &empty,
        ));
        let snap = snapshot(&record, DEFAULT_SNAPSHOT_MAX_CHARS);
        assert!(snap.truncated);
        assert!(snap.length > DEFAULT_SNAPSHOT_MAX_CHARS);
        assert_eq!(snap.line.chars().count(), DEFAULT_SNAPSHOT_MAX_CHARS);
        assert!(!snap.line.contains('\n'));
        assert_eq!(snap.reason_code_count_total, 1);
    }

    #[test]
    fn short_snapshot_is_not_truncated() {
        let snap = snapshot(&GuidanceRecord::none(), DEFAULT_SNAPSHOT_MAX_CHARS);
        assert!(!snap.truncated);
        assert_eq!(
            snap.line,
            "reasonCode=N/A;source=NONE;action=N/A;command=N/A;firstValidationError=N/A"
        );
        assert_eq!(snap.length, snap.line.chars().count());
    }

    #[test]
    fn aggregate_counts_codes_and_sources() {
        let errors = vec![
            "schemaVersion mismatch: expected 1, actual 2".to_string(),
            "steps[0].id is missing".to_string(),
            "schemaVersion mismatch: expected 1, actual 3".to_string(),
        ];
        let aggregate = aggregate_diagnostics(Some(ReasonCode::ReportPathMismatch), &errors);
        assert_eq!(aggregate.reason_code_counts[&ReasonCode::ReportSchemaMismatch], 2);
        assert_eq!(aggregate.reason_code_counts[&ReasonCode::ValidationError], 1);
        assert_eq!(aggregate.reason_code_counts[&ReasonCode::ReportPathMismatch], 1);
        assert_eq!(
            aggregate.reason_code_source_counts[&ReasonCodeSource::ClassifiedFromValidationError],
            3
        );
        assert_eq!(aggregate.reason_code_count_total, 4);
        assert_eq!(aggregate.reason_code_source_count_total, 4);
    }

    #[test]
    fn aggregate_agrees_with_snapshot_for_same_inputs() {
        let errors = vec!["totals mismatch: a".to_string(), "rate mismatch: b".to_string()];
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&GuidanceRequest {
            validation_error_count: errors.len(),
            ..request(
                ReportKind::ExecutionBaseline,
                Some("GATE_NOT_PASSED"),
                errors.first().map(String::as_str),
                &empty,
                &empty,
            )
        });
        let snap = snapshot(&record, DEFAULT_SNAPSHOT_MAX_CHARS);
        assert_eq!(snap.reason_code_count_total, 3);
        let aggregate = aggregate_diagnostics(record.explicit_code(), &errors);
        assert!(check_totals(&aggregate.totals(), &snap.totals()).is_empty());
    }

    #[test]
    fn snapshot_of_another_run_disagrees_with_aggregate() {
        let errors = vec!["totals mismatch: a".to_string(), "rate mismatch: b".to_string()];
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::ExecutionBaseline,
            None,
            errors.first().map(String::as_str),
            &empty,
            &empty,
        ));
        let snap = snapshot(&record, DEFAULT_SNAPSHOT_MAX_CHARS);
        let aggregate = aggregate_diagnostics(record.explicit_code(), &errors);
        assert_eq!(
            check_totals(&aggregate.totals(), &snap.totals()),
            vec![
                "reasonCodeCountTotal mismatch: expected 2, actual 1",
                "reasonCodeSourceCountTotal mismatch: expected 2, actual 1",
            ]
        );
    }

    #[test]
    fn reference_baseline_errors_point_at_the_reference_file() {
        let context = ArtifactPaths::new()
            .with(ArtifactKey::BaselineReport, "cur.json")
            .with(ArtifactKey::ReferenceReport, "ref.json");
        let empty = ArtifactPaths::new();
        let record = resolve_guidance(&request(
            ReportKind::ExecutionBaseline,
            None,
            Some("reference baseline: totals mismatch: executions 10 != completed+running+pending 9"),
            &empty,
            &context,
        ));
        assert_eq!(record.reason_code, Some(ReasonCode::TotalsMismatch));
        assert_eq!(record.suggested_command, "jq '.totals' ref.json");

        let record = resolve_guidance(&request(
            ReportKind::ExecutionBaseline,
            None,
            Some("reference baseline: schemaVersion mismatch: expected 1, actual 2"),
            &empty,
            &context,
        ));
        assert_eq!(record.suggested_command, "jq -r '.schemaVersion' ref.json");

        let record = resolve_guidance(&request(
            ReportKind::ExecutionBaseline,
            None,
            Some("totals mismatch: executions 10 != completed+running+pending 9"),
            &empty,
            &context,
        ));
        assert_eq!(record.suggested_command, "jq '.totals' cur.json");
    }

    #[test]
    fn totals_disagreement_is_named() {
        let expected = DiagnosticsTotals {
            reason_code_count_total: 3,
            reason_code_source_count_total: 3,
        };
        let actual = DiagnosticsTotals {
            reason_code_count_total: 2,
            reason_code_source_count_total: 3,
        };
        assert_eq!(
            check_totals(&expected, &actual),
            vec!["reasonCodeCountTotal mismatch: expected 3, actual 2"]
        );
    }

    #[test]
    fn aggregate_serializes_codes_as_map_keys() {
        let aggregate = aggregate_diagnostics(None, &["gate not passed: 1 violation(s)".to_string()]);
        let json = serde_json::to_value(&aggregate).unwrap();
        assert_eq!(json["reasonCodeCounts"]["GATE_NOT_PASSED"], 1);
        assert_eq!(
            json["reasonCodeSourceCounts"]["CLASSIFIED_FROM_VALIDATION_ERROR"],
            1
        );
    }
}
