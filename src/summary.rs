//! The validation summary: the single document every run produces.

use crate::fingerprint::FailureFingerprint;
use crate::guidance::{
    aggregate_diagnostics, check_totals, resolve_guidance, snapshot, ArtifactPaths, DiagnosticsAggregate,
    GuidanceRecord, GuidanceRequest, GuidanceSnapshot, PathResolver, DEFAULT_SNAPSHOT_MAX_CHARS,
};
use crate::quick_locate::QuickLocateResolution;
use crate::report::{ReportKind, RunStatus};
use crate::trend::RegressionResult;
use crate::validate::Findings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub const SUMMARY_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDiagnostics {
    #[serde(flatten)]
    pub aggregate: DiagnosticsAggregate,
    /// Disagreements between the aggregate and the guidance snapshot.
    pub mismatch_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub report_kind: ReportKind,
    pub status: RunStatus,
    pub inputs: Value,
    pub report: Value,
    pub warnings: Vec<String>,
    pub validation_errors: Vec<String>,
    pub guidance: GuidanceRecord,
    pub guidance_snapshot: GuidanceSnapshot,
    pub diagnostics: SummaryDiagnostics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<FailureFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_locate: Option<QuickLocateResolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regression: Option<RegressionResult>,
}

impl ValidationSummary {
    pub fn passed(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Collects everything one validation produced, then resolves guidance and
/// diagnostics in [`SummaryBuilder::finish`].
#[derive(Debug, Clone)]
pub struct SummaryBuilder {
    kind: ReportKind,
    inputs: Value,
    report: Value,
    errors: Vec<String>,
    warnings: Vec<String>,
    failure_reason_code: Option<String>,
    artifact_overrides: ArtifactPaths,
    artifact_context: ArtifactPaths,
    snapshot_max_chars: usize,
    fingerprint: Option<FailureFingerprint>,
    quick_locate: Option<QuickLocateResolution>,
    regression: Option<RegressionResult>,
}

impl SummaryBuilder {
    pub fn new(kind: ReportKind) -> Self {
        Self {
            kind,
            inputs: Value::Null,
            report: Value::Null,
            errors: Vec::new(),
            warnings: Vec::new(),
            failure_reason_code: None,
            artifact_overrides: ArtifactPaths::new(),
            artifact_context: ArtifactPaths::new(),
            snapshot_max_chars: DEFAULT_SNAPSHOT_MAX_CHARS,
            fingerprint: None,
            quick_locate: None,
            regression: None,
        }
    }

    pub fn inputs<T: Serialize>(&mut self, inputs: &T) -> &mut Self {
        self.inputs = to_value_or_null(inputs, "inputs");
        self
    }

    pub fn report<T: Serialize>(&mut self, projection: &T) -> &mut Self {
        self.report = to_value_or_null(projection, "report");
        self
    }

    pub fn findings(&mut self, findings: Findings) -> &mut Self {
        self.errors.extend(findings.errors);
        self.warnings.extend(findings.warnings);
        self
    }

    pub fn error(&mut self, message: impl Into<String>) -> &mut Self {
        self.errors.push(message.into());
        self
    }

    pub fn warning(&mut self, message: impl Into<String>) -> &mut Self {
        self.warnings.push(message.into());
        self
    }

    pub fn failure_reason_code(&mut self, code: Option<&str>) -> &mut Self {
        self.failure_reason_code = code.map(str::to_string);
        self
    }

    pub fn artifact_overrides(&mut self, paths: ArtifactPaths) -> &mut Self {
        self.artifact_overrides = paths;
        self
    }

    pub fn artifact_context(&mut self, paths: ArtifactPaths) -> &mut Self {
        self.artifact_context = paths;
        self
    }

    pub fn snapshot_max_chars(&mut self, max: usize) -> &mut Self {
        self.snapshot_max_chars = max;
        self
    }

    pub fn fingerprint(&mut self, fingerprint: Option<FailureFingerprint>) -> &mut Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn quick_locate(&mut self, resolution: Option<QuickLocateResolution>) -> &mut Self {
        self.quick_locate = resolution;
        self
    }

    pub fn regression(&mut self, result: RegressionResult) -> &mut Self {
        self.regression = Some(result);
        self
    }

    pub fn finish(self, now: DateTime<Utc>) -> ValidationSummary {
        let paths = PathResolver {
            overrides: &self.artifact_overrides,
            context: &self.artifact_context,
        };
        let guidance = resolve_guidance(&GuidanceRequest {
            report_kind: self.kind,
            failure_reason_code: self.failure_reason_code.as_deref(),
            first_validation_error: self.errors.first().map(String::as_str),
            validation_error_count: self.errors.len(),
            paths,
        });
        let guidance_snapshot = snapshot(&guidance, self.snapshot_max_chars);
        let aggregate = aggregate_diagnostics(guidance.explicit_code(), &self.errors);
        let mismatch_reasons = check_totals(&aggregate.totals(), &guidance_snapshot.totals());
        if !mismatch_reasons.is_empty() {
            warn!(reasons = ?mismatch_reasons, "diagnostics totals disagree with guidance snapshot");
        }

        let status = RunStatus::from_error_count(self.errors.len());
        info!(
            kind = %self.kind,
            status = status.as_str(),
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            "validation finished"
        );

        ValidationSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            generated_at: now,
            report_kind: self.kind,
            status,
            inputs: self.inputs,
            report: self.report,
            warnings: self.warnings,
            validation_errors: self.errors,
            guidance,
            guidance_snapshot,
            diagnostics: SummaryDiagnostics {
                aggregate,
                mismatch_reasons,
            },
            fingerprint: self.fingerprint,
            quick_locate: self.quick_locate,
            regression: self.regression,
        }
    }
}

fn to_value_or_null<T: Serialize>(value: &T, what: &str) -> Value {
    match serde_json::to_value(value) {
        Ok(value) => value,
        Err(error) => {
            warn!(field = what, error = %error, "could not serialize summary field");
            Value::Null
        }
    }
}
