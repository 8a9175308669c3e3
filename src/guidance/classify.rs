//! Reason codes and the ordered rules that classify validation messages.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    ReportSchemaMismatch,
    ReportPathMismatch,
    ArtifactOptionsPathMismatch,
    SummaryJsonAssertRequired,
    FailedStepIdsMismatch,
    SummaryCounterMismatch,
    StatusStepConflict,
    ReportReadError,
    TotalsMismatch,
    RateMismatch,
    PercentileOrderViolation,
    GateConsistencyViolation,
    GateNotPassed,
    GateWarningsPresent,
    PerfScenarioMissing,
    PerfThresholdViolation,
    FailureFingerprintMismatch,
    QuickLocateRouteMismatch,
    DiagnosticsTotalsMismatch,
    TrendReferenceMissing,
    TrendRegression,
    ValidationError,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 22] = [
        ReasonCode::ReportSchemaMismatch,
        ReasonCode::ReportPathMismatch,
        ReasonCode::ArtifactOptionsPathMismatch,
        ReasonCode::SummaryJsonAssertRequired,
        ReasonCode::FailedStepIdsMismatch,
        ReasonCode::SummaryCounterMismatch,
        ReasonCode::StatusStepConflict,
        ReasonCode::ReportReadError,
        ReasonCode::TotalsMismatch,
        ReasonCode::RateMismatch,
        ReasonCode::PercentileOrderViolation,
        ReasonCode::GateConsistencyViolation,
        ReasonCode::GateNotPassed,
        ReasonCode::GateWarningsPresent,
        ReasonCode::PerfScenarioMissing,
        ReasonCode::PerfThresholdViolation,
        ReasonCode::FailureFingerprintMismatch,
        ReasonCode::QuickLocateRouteMismatch,
        ReasonCode::DiagnosticsTotalsMismatch,
        ReasonCode::TrendReferenceMissing,
        ReasonCode::TrendRegression,
        ReasonCode::ValidationError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::ReportSchemaMismatch => "REPORT_SCHEMA_MISMATCH",
            ReasonCode::ReportPathMismatch => "REPORT_PATH_MISMATCH",
            ReasonCode::ArtifactOptionsPathMismatch => "ARTIFACT_OPTIONS_PATH_MISMATCH",
            ReasonCode::SummaryJsonAssertRequired => "SUMMARY_JSON_ASSERT_REQUIRED",
            ReasonCode::FailedStepIdsMismatch => "FAILED_STEP_IDS_MISMATCH",
            ReasonCode::SummaryCounterMismatch => "SUMMARY_COUNTER_MISMATCH",
            ReasonCode::StatusStepConflict => "STATUS_STEP_CONFLICT",
            ReasonCode::ReportReadError => "REPORT_READ_ERROR",
            ReasonCode::TotalsMismatch => "TOTALS_MISMATCH",
            ReasonCode::RateMismatch => "RATE_MISMATCH",
            ReasonCode::PercentileOrderViolation => "PERCENTILE_ORDER_VIOLATION",
            ReasonCode::GateConsistencyViolation => "GATE_CONSISTENCY_VIOLATION",
            ReasonCode::GateNotPassed => "GATE_NOT_PASSED",
            ReasonCode::GateWarningsPresent => "GATE_WARNINGS_PRESENT",
            ReasonCode::PerfScenarioMissing => "PERF_SCENARIO_MISSING",
            ReasonCode::PerfThresholdViolation => "PERF_THRESHOLD_VIOLATION",
            ReasonCode::FailureFingerprintMismatch => "FAILURE_FINGERPRINT_MISMATCH",
            ReasonCode::QuickLocateRouteMismatch => "QUICK_LOCATE_ROUTE_MISMATCH",
            ReasonCode::DiagnosticsTotalsMismatch => "DIAGNOSTICS_TOTALS_MISMATCH",
            ReasonCode::TrendReferenceMissing => "TREND_REFERENCE_MISSING",
            ReasonCode::TrendRegression => "TREND_REGRESSION",
            ReasonCode::ValidationError => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ReasonCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == wanted)
            .ok_or_else(|| format!("unknown reason code '{}'", s))
    }
}

/// Where a reason code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCodeSource {
    ExplicitFailureReasonCode,
    ClassifiedFromValidationError,
    None,
}

impl ReasonCodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCodeSource::ExplicitFailureReasonCode => "EXPLICIT_FAILURE_REASON_CODE",
            ReasonCodeSource::ClassifiedFromValidationError => "CLASSIFIED_FROM_VALIDATION_ERROR",
            ReasonCodeSource::None => "NONE",
        }
    }
}

/// Prefix marking errors that belong to the reference baseline of a trend
/// comparison rather than to the report under validation.
pub const REFERENCE_SCOPE: &str = "reference baseline: ";

/// Classification rules, matched in order against the head of the lower-cased
/// message. Every rule is anchored so that report text quoted later in a
/// message cannot select a different code.
pub const CLASSIFICATION_RULES: &[(&str, ReasonCode)] = &[
    (r"^failed to (read|parse) report", ReasonCode::ReportReadError),
    (r"^schemaversion mismatch", ReasonCode::ReportSchemaMismatch),
    (r"^report path mismatch", ReasonCode::ReportPathMismatch),
    (r"^artifact path mismatch", ReasonCode::ArtifactOptionsPathMismatch),
    (r"^summary json assert step \S+ is required", ReasonCode::SummaryJsonAssertRequired),
    (r"^failedstep(ids|name) mismatch", ReasonCode::FailedStepIdsMismatch),
    (r"^summary counter mismatch", ReasonCode::SummaryCounterMismatch),
    (r"^(\S+ )?status conflict", ReasonCode::StatusStepConflict),
    (r"^totals mismatch", ReasonCode::TotalsMismatch),
    (r"^rate mismatch", ReasonCode::RateMismatch),
    (r"^percentile order violation", ReasonCode::PercentileOrderViolation),
    (r"^gate consistency violation", ReasonCode::GateConsistencyViolation),
    (r"^gate not passed", ReasonCode::GateNotPassed),
    (r"^gate warnings present", ReasonCode::GateWarningsPresent),
    (r"^required perf scenario missing", ReasonCode::PerfScenarioMissing),
    (r"^perf threshold violations", ReasonCode::PerfThresholdViolation),
    (r"^failure fingerprint mismatch", ReasonCode::FailureFingerprintMismatch),
    (r"^quick locate (route|source|command) mismatch", ReasonCode::QuickLocateRouteMismatch),
    (r"^(\S+\.)?reasoncode(source)?counttotal mismatch", ReasonCode::DiagnosticsTotalsMismatch),
    (r"^trend reference report missing", ReasonCode::TrendReferenceMissing),
    (r"^trend regression:", ReasonCode::TrendRegression),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, ReasonCode)>> = LazyLock::new(|| {
    CLASSIFICATION_RULES
        .iter()
        .filter_map(|(pattern, code)| Regex::new(pattern).ok().map(|re| (re, *code)))
        .collect()
});

/// Whether the message was emitted for the reference baseline.
pub fn is_reference_scoped(message: &str) -> bool {
    message.trim_start().to_lowercase().starts_with(REFERENCE_SCOPE)
}

/// First matching rule wins; unmatched messages fall back to `VALIDATION_ERROR`.
/// A reference scope prefix is skipped before matching.
pub fn classify(message: &str) -> ReasonCode {
    let lower = message.trim_start().to_lowercase();
    let head = lower.strip_prefix(REFERENCE_SCOPE).unwrap_or(&lower);
    COMPILED_RULES
        .iter()
        .find(|(re, _)| re.is_match(head))
        .map(|(_, code)| *code)
        .unwrap_or(ReasonCode::ValidationError)
}
