//! Quick locate: pick the single command an operator should run first.
//!
//! Each caller walks a fixed priority chain of candidate sources and stops at
//! the first candidate that supplies both a command and a first-failed-output
//! line. The selected source names the first-fix route.

use crate::util::{non_empty, NOT_AVAILABLE};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuickLocateSource {
    #[serde(rename = "STEP_OVERRIDE")]
    StepOverride,
    #[serde(rename = "VALIDATION_FAILURE_INDEX")]
    ValidationFailureIndex,
    #[serde(rename = "FAILURE_FINGERPRINT")]
    FailureFingerprint,
    #[serde(rename = "FAILED_STEP")]
    FailedStep,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl QuickLocateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuickLocateSource::StepOverride => "STEP_OVERRIDE",
            QuickLocateSource::ValidationFailureIndex => "VALIDATION_FAILURE_INDEX",
            QuickLocateSource::FailureFingerprint => "FAILURE_FINGERPRINT",
            QuickLocateSource::FailedStep => "FAILED_STEP",
            QuickLocateSource::NotAvailable => NOT_AVAILABLE,
        }
    }
}

impl fmt::Display for QuickLocateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirstFixRoute {
    RunQualityValidationSuggestedCommand,
    RunQualityFingerprintCommand,
    RunQualityFailedStepCommand,
    InspectQualityReportStepsAndFailureIndex,
    RunStepOverrideCommand,
    RunFingerprintCommand,
    RunFailedStepCommand,
    InspectReportSteps,
}

impl FirstFixRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirstFixRoute::RunQualityValidationSuggestedCommand => {
                "RUN_QUALITY_VALIDATION_SUGGESTED_COMMAND"
            }
            FirstFixRoute::RunQualityFingerprintCommand => "RUN_QUALITY_FINGERPRINT_COMMAND",
            FirstFixRoute::RunQualityFailedStepCommand => "RUN_QUALITY_FAILED_STEP_COMMAND",
            FirstFixRoute::InspectQualityReportStepsAndFailureIndex => {
                "INSPECT_QUALITY_REPORT_STEPS_AND_FAILURE_INDEX"
            }
            FirstFixRoute::RunStepOverrideCommand => "RUN_STEP_OVERRIDE_COMMAND",
            FirstFixRoute::RunFingerprintCommand => "RUN_FINGERPRINT_COMMAND",
            FirstFixRoute::RunFailedStepCommand => "RUN_FAILED_STEP_COMMAND",
            FirstFixRoute::InspectReportSteps => "INSPECT_REPORT_STEPS",
        }
    }
}

impl fmt::Display for FirstFixRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which caller is resolving, and therefore which priority order applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuickLocateChain {
    /// `VALIDATION_FAILURE_INDEX > FAILURE_FINGERPRINT > FAILED_STEP > N/A`
    QualityGate,
    /// `STEP_OVERRIDE > FAILED_STEP > N/A`
    SelfCheck,
    /// `FAILURE_FINGERPRINT > FAILED_STEP > N/A`
    Summary,
}

impl QuickLocateChain {
    pub fn priority(&self) -> &'static [QuickLocateSource] {
        match self {
            QuickLocateChain::QualityGate => &[
                QuickLocateSource::ValidationFailureIndex,
                QuickLocateSource::FailureFingerprint,
                QuickLocateSource::FailedStep,
                QuickLocateSource::NotAvailable,
            ],
            QuickLocateChain::SelfCheck => &[
                QuickLocateSource::StepOverride,
                QuickLocateSource::FailedStep,
                QuickLocateSource::NotAvailable,
            ],
            QuickLocateChain::Summary => &[
                QuickLocateSource::FailureFingerprint,
                QuickLocateSource::FailedStep,
                QuickLocateSource::NotAvailable,
            ],
        }
    }

    pub fn priority_label(&self) -> String {
        self.priority()
            .iter()
            .map(QuickLocateSource::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    pub fn route_for(&self, source: QuickLocateSource) -> FirstFixRoute {
        match (self, source) {
            (QuickLocateChain::QualityGate, QuickLocateSource::ValidationFailureIndex) => {
                FirstFixRoute::RunQualityValidationSuggestedCommand
            }
            (QuickLocateChain::QualityGate, QuickLocateSource::FailureFingerprint) => {
                FirstFixRoute::RunQualityFingerprintCommand
            }
            (QuickLocateChain::QualityGate, QuickLocateSource::FailedStep) => {
                FirstFixRoute::RunQualityFailedStepCommand
            }
            (QuickLocateChain::QualityGate, _) => {
                FirstFixRoute::InspectQualityReportStepsAndFailureIndex
            }
            (_, QuickLocateSource::StepOverride) => FirstFixRoute::RunStepOverrideCommand,
            (_, QuickLocateSource::FailureFingerprint) => FirstFixRoute::RunFingerprintCommand,
            (_, QuickLocateSource::FailedStep) => FirstFixRoute::RunFailedStepCommand,
            (_, _) => FirstFixRoute::InspectReportSteps,
        }
    }
}

/// One possible origin of the quick-locate command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickLocateCandidate {
    pub source: QuickLocateSource,
    pub command: Option<String>,
    pub first_failed_output: Option<String>,
}

impl QuickLocateCandidate {
    pub fn new(source: QuickLocateSource, command: Option<&str>, output: Option<&str>) -> Self {
        Self {
            source,
            command: command.map(str::to_string),
            first_failed_output: output.map(str::to_string),
        }
    }

    /// A candidate is usable only with both a runnable command and an output line.
    pub fn has_usable_command(&self) -> bool {
        non_empty(self.command.as_deref()).is_some()
            && non_empty(self.first_failed_output.as_deref()).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickLocateResolution {
    pub chain: QuickLocateChain,
    pub priority: Vec<QuickLocateSource>,
    pub priority_label: String,
    pub source: QuickLocateSource,
    pub command: String,
    pub first_failed_output: String,
    pub first_fix_route: FirstFixRoute,
}

pub fn resolve_quick_locate(
    chain: QuickLocateChain,
    candidates: &[QuickLocateCandidate],
) -> QuickLocateResolution {
    let selected = chain.priority().iter().find_map(|source| {
        candidates
            .iter()
            .find(|candidate| candidate.source == *source && candidate.has_usable_command())
    });

    let (source, command, output) = match selected {
        Some(candidate) => (
            candidate.source,
            non_empty(candidate.command.as_deref()).unwrap_or(NOT_AVAILABLE).to_string(),
            non_empty(candidate.first_failed_output.as_deref())
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
        ),
        None => (
            QuickLocateSource::NotAvailable,
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
        ),
    };
    let first_fix_route = chain.route_for(source);
    debug!(chain = ?chain, source = %source, route = %first_fix_route, "resolved quick locate");

    QuickLocateResolution {
        chain,
        priority: chain.priority().to_vec(),
        priority_label: chain.priority_label(),
        source,
        command,
        first_failed_output: output,
        first_fix_route,
    }
}

/// Quick-locate choice a report recorded about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredQuickLocate {
    pub source: Option<String>,
    pub first_fix_route: String,
    pub command: Option<String>,
}

/// Compare a declared choice with the independently computed one.
pub fn check_declared(declared: &DeclaredQuickLocate, computed: &QuickLocateResolution) -> Vec<String> {
    let mut errors = Vec::new();
    if declared.first_fix_route != computed.first_fix_route.as_str() {
        errors.push(format!(
            "quick locate route mismatch: declared {}, computed {}",
            declared.first_fix_route, computed.first_fix_route
        ));
    }
    if let Some(source) = non_empty(declared.source.as_deref()) {
        if source != computed.source.as_str() {
            errors.push(format!(
                "quick locate source mismatch: declared {}, computed {}",
                source, computed.source
            ));
        }
    }
    if let Some(command) = non_empty(declared.command.as_deref()) {
        if command != computed.command {
            errors.push(format!(
                "quick locate command mismatch: declared '{}', computed '{}'",
                command, computed.command
            ));
        }
    }
    errors
}
