//! End-to-end validation: validator, trend, fingerprint and quick locate feed
//! one [`ValidationSummary`] per report.

use crate::config::ThresholdSet;
use crate::guidance::classify::REFERENCE_SCOPE;
use crate::guidance::{ArtifactKey, ArtifactPaths, ReasonCode, DEFAULT_SNAPSHOT_MAX_CHARS};
use crate::loader::{read_optional_report, read_report};
use crate::report::{RawReport, ReportKind};
use crate::summary::{SummaryBuilder, ValidationSummary};
use crate::trend::compare_trend;
use crate::validate::quality_gate::QualityArtifacts;
use crate::validate::{
    validate_baseline, validate_perf, validate_quality_gate, validate_smoke, BaselineOptions, PerfOptions,
    QualityGateOptions, SmokeOptions,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Settings shared by every report kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonOptions {
    /// Reason code supplied by the caller; wins over classification when known.
    pub failure_reason_code: Option<String>,
    /// Artifact paths that take precedence over anything the report records.
    pub artifact_paths: ArtifactPaths,
    pub snapshot_max_chars: usize,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            failure_reason_code: None,
            artifact_paths: ArtifactPaths::new(),
            snapshot_max_chars: DEFAULT_SNAPSHOT_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum KindOptions {
    Smoke(SmokeOptions),
    Perf(PerfOptions),
    Baseline(BaselineOptions),
    QualityGate(QualityGateOptions),
}

impl KindOptions {
    pub fn kind(&self) -> ReportKind {
        match self {
            KindOptions::Smoke(_) => ReportKind::Smoke,
            KindOptions::Perf(_) => ReportKind::Perf,
            KindOptions::Baseline(_) => ReportKind::ExecutionBaseline,
            KindOptions::QualityGate(_) => ReportKind::QualityGate,
        }
    }

    pub fn default_for(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Smoke => KindOptions::Smoke(SmokeOptions::default()),
            ReportKind::Perf => KindOptions::Perf(PerfOptions::default()),
            ReportKind::ExecutionBaseline => KindOptions::Baseline(BaselineOptions::default()),
            ReportKind::QualityGate => KindOptions::QualityGate(QualityGateOptions::default()),
        }
    }
}

/// One report to validate, already read.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub report: RawReport,
    pub source_path: Option<String>,
    pub options: KindOptions,
    pub common: CommonOptions,
}

pub fn validate_report(request: &ValidationRequest, now: DateTime<Utc>) -> ValidationSummary {
    let kind = request.options.kind();
    if kind != request.report.kind {
        warn!(
            expected = %kind,
            actual = %request.report.kind,
            "options do not match report kind; validating with the options' kind"
        );
    }

    let mut builder = builder_for(kind, &request.common, request.source_path.as_deref());
    builder.inputs(&json!({
        "sourcePath": request.source_path,
        "options": request.options,
        "common": request.common,
    }));
    let value = &request.report.value;

    match &request.options {
        KindOptions::Smoke(options) => {
            let (projection, findings) = validate_smoke(value, options);
            builder
                .fingerprint(projection.fingerprint.clone())
                .quick_locate(projection.quick_locate.clone())
                .report(&projection)
                .findings(findings);
        }
        KindOptions::Perf(options) => {
            let (projection, findings) = validate_perf(value, options);
            builder.report(&projection).findings(findings);
        }
        KindOptions::Baseline(options) => {
            let (projection, findings) = validate_baseline(value, options);
            builder.report(&projection).findings(findings);
        }
        KindOptions::QualityGate(options) => {
            let mut options = options.clone();
            if options.report_path.is_none() {
                options.report_path = request.source_path.clone();
            }
            let (projection, findings) = validate_quality_gate(value, &options);
            builder
                .artifact_context(quality_context(&projection.artifacts, request.source_path.as_deref()))
                .fingerprint(projection.fingerprint.clone())
                .quick_locate(projection.quick_locate.clone())
                .report(&projection)
                .findings(findings);
        }
    }

    builder.finish(now)
}

/// Validate several independent reports in parallel; order is preserved.
pub fn validate_batch(requests: &[ValidationRequest], now: DateTime<Utc>) -> Vec<ValidationSummary> {
    debug!(reports = requests.len(), "validating batch");
    requests
        .par_iter()
        .map(|request| validate_report(request, now))
        .collect()
}

/// Read and validate one report file. Unreadable files become a failed
/// summary carrying `REPORT_READ_ERROR`.
pub fn validate_path(
    path: &Path,
    options: KindOptions,
    common: CommonOptions,
    now: DateTime<Utc>,
) -> ValidationSummary {
    let kind = options.kind();
    let source_path = path.display().to_string();
    match read_report(kind, path) {
        Ok(report) => validate_report(
            &ValidationRequest {
                report,
                source_path: Some(source_path),
                options,
                common,
            },
            now,
        ),
        Err(error) => read_error_summary(kind, &source_path, &error, &common, now),
    }
}

pub fn read_error_summary(
    kind: ReportKind,
    source_path: &str,
    error: &anyhow::Error,
    common: &CommonOptions,
    now: DateTime<Utc>,
) -> ValidationSummary {
    warn!(kind = %kind, path = source_path, error = %error, "report could not be read");
    let mut builder = builder_for(kind, common, Some(source_path));
    builder
        .inputs(&json!({"sourcePath": source_path, "common": common}))
        .error(format!("{:#}", error))
        .failure_reason_code(Some(ReasonCode::ReportReadError.as_str()));
    builder.finish(now)
}

/// Inputs of a trend comparison between two execution-baseline files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendRequest {
    pub current_path: String,
    pub reference_path: String,
    pub thresholds: ThresholdSet,
    pub allow_missing_reference: bool,
    pub baseline: BaselineOptions,
    pub common: CommonOptions,
}

/// Validate the current baseline, and the reference when present, then
/// compare them.
pub fn validate_trend(
    current: &Value,
    reference: Option<&Value>,
    request: &TrendRequest,
    now: DateTime<Utc>,
) -> ValidationSummary {
    let mut builder = builder_for(ReportKind::ExecutionBaseline, &request.common, Some(&request.current_path));
    let mut context = ArtifactPaths::new().with(ArtifactKey::BaselineReport, &request.current_path);
    context.set(ArtifactKey::ReferenceReport, &request.reference_path);
    builder.artifact_context(context).inputs(request);

    let (current_projection, findings) = validate_baseline(current, &request.baseline);
    builder.findings(findings);

    let reference_projection = reference.map(|value| {
        // Gate verdicts of the reference run do not matter here.
        let (projection, findings) = validate_baseline(value, &BaselineOptions::default());
        for error in findings.errors {
            builder.error(format!("{}{}", REFERENCE_SCOPE, error));
        }
        projection
    });

    let result = compare_trend(
        &current_projection,
        reference_projection.as_ref(),
        &request.thresholds,
        request.allow_missing_reference,
    );
    for warning in &result.warnings {
        builder.warning(warning.clone());
    }
    for error in &result.validation_errors {
        if reference.is_none() {
            builder.error(format!("{} ({})", error, request.reference_path));
        } else {
            builder.error(error.clone());
        }
    }
    for regression in &result.regressions {
        builder.error(format!("trend regression: {}", regression));
    }

    builder.report(&current_projection).regression(result);
    builder.finish(now)
}

/// Read both baselines and compare them. A reference file that does not exist
/// counts as a missing reference; any other read failure fails the run.
pub fn validate_trend_paths(request: &TrendRequest, now: DateTime<Utc>) -> ValidationSummary {
    let current = match read_report(ReportKind::ExecutionBaseline, Path::new(&request.current_path)) {
        Ok(report) => report,
        Err(error) => {
            return read_error_summary(
                ReportKind::ExecutionBaseline,
                &request.current_path,
                &error,
                &request.common,
                now,
            )
        }
    };
    match read_optional_report(ReportKind::ExecutionBaseline, Path::new(&request.reference_path)) {
        Ok(reference) => validate_trend(
            &current.value,
            reference.as_ref().map(|report| &report.value),
            request,
            now,
        ),
        Err(error) => read_error_summary(
            ReportKind::ExecutionBaseline,
            &request.reference_path,
            &error,
            &request.common,
            now,
        ),
    }
}

fn builder_for(kind: ReportKind, common: &CommonOptions, source_path: Option<&str>) -> SummaryBuilder {
    let mut builder = SummaryBuilder::new(kind);
    let mut context = ArtifactPaths::new();
    if let Some(path) = source_path {
        context.set(ArtifactKey::for_report(kind), path);
    }
    builder
        .failure_reason_code(common.failure_reason_code.as_deref())
        .artifact_overrides(common.artifact_paths.clone())
        .artifact_context(context)
        .snapshot_max_chars(common.snapshot_max_chars);
    builder
}

/// Artifact paths a quality-gate report recorded, used to parameterize commands.
fn quality_context(artifacts: &QualityArtifacts, source_path: Option<&str>) -> ArtifactPaths {
    let mut context = ArtifactPaths::new();
    let recorded = [
        (ArtifactKey::SmokeReport, &artifacts.smoke_report_path),
        (ArtifactKey::PerfReport, &artifacts.perf_report_path),
        (ArtifactKey::SummaryMarkdown, &artifacts.summary_markdown_path),
        (ArtifactKey::SummaryJson, &artifacts.summary_json_path),
    ];
    for (key, path) in recorded {
        if let Some(path) = path {
            context.set(key, path.as_str());
        }
    }
    if let Some(path) = source_path.or(artifacts.self_report_path.as_deref()) {
        context.set(ArtifactKey::QualityReport, path);
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidance::ReasonCodeSource;
    use crate::quick_locate::FirstFixRoute;
    use crate::report::RunStatus;
    use crate::trend::TrendStatus;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap()
    }

    fn baseline(success: u64, failed: u64, p95: u64) -> Value {
        let executions = success + failed;
        let rate = |n: u64| n as f64 / executions as f64;
        json!({
            "schemaVersion": "1",
            "runId": format!("baseline-{}", success),
            "window": {"since": "2026-10-12T00:00:00Z", "days": 7, "batchSize": 500},
            "totals": {
                "executions": executions, "completed": executions, "running": 0, "pending": 0,
                "success": success, "failed": failed, "canceled": 0, "timeoutFailures": 0
            },
            "rates": {
                "successRate": rate(success),
                "failedRate": rate(failed),
                "canceledRate": 0.0,
                "timeoutRate": 0.0,
                "completedSuccessRate": rate(success)
            },
            "latencyMs": {"p50": 100, "p90": 200, "p95": p95, "p99": p95 + 1000},
            "gate": {"passed": true, "evaluated": true, "thresholds": {}, "violations": [], "warnings": []}
        })
    }

    fn smoke_report() -> Value {
        json!({
            "schemaVersion": "1",
            "runId": "smoke-1",
            "mode": "base",
            "status": "FAILED",
            "steps": [{
                "id": "api",
                "name": "API smoke",
                "command": "npm run smoke:api",
                "status": "FAILED",
                "attempts": [
                    {"attempt": 1, "exitCode": 1, "durationMs": 900},
                    {"attempt": 2, "exitCode": 1, "durationMs": 950}
                ],
                "retryCount": 1,
                "output": "GET /health -> 503\nstack"
            }],
            "summary": {
                "totalSteps": 1, "successfulSteps": 0, "failedSteps": 1,
                "totalRetries": 1, "failedStepName": "API smoke"
            }
        })
    }

    fn request(kind: ReportKind, value: Value) -> ValidationRequest {
        ValidationRequest {
            report: RawReport::new(kind, value),
            source_path: Some(format!("artifacts/{}.json", kind)),
            options: KindOptions::default_for(kind),
            common: CommonOptions::default(),
        }
    }

    fn trend_request(current_path: &str, reference_path: &str) -> TrendRequest {
        TrendRequest {
            current_path: current_path.to_string(),
            reference_path: reference_path.to_string(),
            thresholds: ThresholdSet::default(),
            allow_missing_reference: false,
            baseline: BaselineOptions::default(),
            common: CommonOptions::default(),
        }
    }

    #[test]
    fn failed_smoke_run_is_valid_and_carries_quick_locate() {
        let summary = validate_report(&request(ReportKind::Smoke, smoke_report()), now());
        assert!(summary.passed(), "{:?}", summary.validation_errors);
        let fp = summary.fingerprint.unwrap();
        assert_eq!(fp.signature, "stepId=api|exitCode=1|output=GET /health -> 503");
        let ql = summary.quick_locate.unwrap();
        assert_eq!(ql.first_fix_route, FirstFixRoute::RunFingerprintCommand);
        assert_eq!(ql.command, "npm run smoke:api");
        assert_eq!(summary.inputs["sourcePath"], "artifacts/smoke.json");
    }

    #[test]
    fn invalid_report_gets_guidance_with_its_own_path() {
        let mut value = smoke_report();
        value["schemaVersion"] = json!("0");
        let summary = validate_report(&request(ReportKind::Smoke, value), now());
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::ReportSchemaMismatch));
        assert_eq!(
            summary.guidance.suggested_command,
            "jq -r '.schemaVersion' artifacts/smoke.json"
        );
    }

    #[test]
    fn explicit_reason_code_wins_over_classification() {
        let mut value = smoke_report();
        value["schemaVersion"] = json!("0");
        let mut req = request(ReportKind::Smoke, value);
        req.common.failure_reason_code = Some("REPORT_PATH_MISMATCH".to_string());
        let summary = validate_report(&req, now());
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::ReportPathMismatch));
        assert_eq!(
            summary.guidance.reason_code_source,
            ReasonCodeSource::ExplicitFailureReasonCode
        );
    }

    #[test]
    fn batch_preserves_order() {
        let requests = vec![
            request(ReportKind::Smoke, smoke_report()),
            request(ReportKind::ExecutionBaseline, baseline(95, 5, 1000)),
            request(ReportKind::Perf, json!({"schemaVersion": "1"})),
        ];
        let summaries = validate_batch(&requests, now());
        let kinds: Vec<_> = summaries.iter().map(|s| s.report_kind).collect();
        assert_eq!(
            kinds,
            vec![ReportKind::Smoke, ReportKind::ExecutionBaseline, ReportKind::Perf]
        );
        assert!(summaries[0].passed());
        assert!(summaries[1].passed(), "{:?}", summaries[1].validation_errors);
        assert!(!summaries[2].passed());
    }

    #[test]
    fn unreadable_file_becomes_report_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let summary = validate_path(
            &path,
            KindOptions::default_for(ReportKind::Perf),
            CommonOptions::default(),
            now(),
        );
        assert_eq!(summary.status, RunStatus::Failed);
        assert_eq!(summary.validation_errors.len(), 1);
        assert!(summary.validation_errors[0].starts_with("Failed to read report"));
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::ReportReadError));
        assert_eq!(
            summary.guidance.reason_code_source,
            ReasonCodeSource::ExplicitFailureReasonCode
        );
        assert!(summary.diagnostics.mismatch_reasons.is_empty());
    }

    #[test]
    fn quality_gate_self_path_defaults_to_source_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quality.json");
        let report = json!({
            "schemaVersion": "1",
            "runId": "q-1",
            "status": "SUCCESS",
            "artifacts": {"selfReportPath": "somewhere/else.json"},
            "steps": [],
            "summary": {"totalSteps": 0, "successfulSteps": 0, "failedSteps": 0, "failedStepIds": []}
        });
        fs::write(&path, report.to_string()).unwrap();
        let summary = validate_path(
            &path,
            KindOptions::default_for(ReportKind::QualityGate),
            CommonOptions::default(),
            now(),
        );
        assert_eq!(summary.validation_errors.len(), 1);
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::ReportPathMismatch));
        assert_eq!(
            summary.quick_locate.map(|ql| ql.first_fix_route),
            Some(FirstFixRoute::InspectQualityReportStepsAndFailureIndex)
        );
    }

    #[test]
    fn regressions_become_validation_errors() {
        let current = baseline(90, 10, 1000);
        let reference = baseline(98, 2, 1000);
        let summary = validate_trend(&current, Some(&reference), &trend_request("cur.json", "ref.json"), now());
        assert_eq!(summary.status, RunStatus::Failed);
        assert!(summary
            .validation_errors
            .iter()
            .all(|e| e.starts_with("trend regression: ")));
        assert_eq!(summary.validation_errors.len(), 2);
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::TrendRegression));
        assert_eq!(
            summary.guidance.suggested_command,
            "gatecheck trend --current cur.json --reference ref.json --thresholds quality-thresholds.toml"
        );
        assert_eq!(summary.regression.unwrap().status, TrendStatus::Failed);
    }

    #[test]
    fn rate_that_contradicts_totals_is_not_trended() {
        let mut current = baseline(95, 5, 1000);
        current["rates"]["successRate"] = json!(0.5);
        let reference = baseline(95, 5, 1000);
        let summary = validate_trend(&current, Some(&reference), &trend_request("cur.json", "ref.json"), now());
        assert_eq!(
            summary.validation_errors,
            vec!["rate mismatch: rates.successRate expected 0.950000, actual 0.5"]
        );
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::RateMismatch));
        assert!(summary
            .warnings
            .contains(&"successRate failed validation in current baseline; comparison skipped".to_string()));
    }

    #[test]
    fn reference_errors_are_scoped_to_the_reference_file() {
        let current = baseline(95, 5, 1000);
        let mut reference = baseline(95, 5, 1000);
        reference["totals"]["executions"] = json!(101);
        reference["rates"] = json!({
            "successRate": 95.0 / 101.0,
            "failedRate": 5.0 / 101.0,
            "canceledRate": 0.0,
            "timeoutRate": 0.0,
            "completedSuccessRate": 0.95
        });
        let summary = validate_trend(&current, Some(&reference), &trend_request("cur.json", "ref.json"), now());
        assert_eq!(
            summary.validation_errors,
            vec!["reference baseline: totals mismatch: executions 101 != completed+running+pending 100"]
        );
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::TotalsMismatch));
        assert_eq!(summary.guidance.suggested_command, "jq '.totals' ref.json");
    }

    #[test]
    fn missing_reference_file_is_skipped_when_allowed() {
        let dir = tempdir().unwrap();
        let current_path = dir.path().join("current.json");
        fs::write(&current_path, baseline(95, 5, 1000).to_string()).unwrap();
        let reference_path = dir.path().join("reference.json");

        let mut request = trend_request(
            &current_path.display().to_string(),
            &reference_path.display().to_string(),
        );
        request.allow_missing_reference = true;
        let summary = validate_trend_paths(&request, now());
        assert!(summary.passed(), "{:?}", summary.validation_errors);
        assert_eq!(summary.warnings.len(), 1);
        assert_eq!(summary.regression.as_ref().map(|r| r.status), Some(TrendStatus::Skipped));

        request.allow_missing_reference = false;
        let summary = validate_trend_paths(&request, now());
        assert_eq!(summary.validation_errors.len(), 1);
        assert_eq!(summary.guidance.reason_code, Some(ReasonCode::TrendReferenceMissing));
    }
}
