//! Report kinds consumed by the validators.
//!
//! Reports arrive as untyped JSON so that a missing or mistyped field turns
//! into a validation error instead of a deserialization failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    Smoke,
    Perf,
    ExecutionBaseline,
    QualityGate,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Smoke,
        ReportKind::Perf,
        ReportKind::ExecutionBaseline,
        ReportKind::QualityGate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Smoke => "smoke",
            ReportKind::Perf => "perf",
            ReportKind::ExecutionBaseline => "execution-baseline",
            ReportKind::QualityGate => "quality-gate",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of a run or a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn from_error_count(count: usize) -> Self {
        if count == 0 {
            RunStatus::Success
        } else {
            RunStatus::Failed
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "SUCCESS",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(StepStatus::Success),
            "FAILED" => Ok(StepStatus::Failed),
            "SKIPPED" => Ok(StepStatus::Skipped),
            other => Err(format!("unknown step status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmokeMode {
    Base,
    Extended,
    Gate,
}

impl SmokeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmokeMode::Base => "base",
            SmokeMode::Extended => "extended",
            SmokeMode::Gate => "gate",
        }
    }
}

impl FromStr for SmokeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base" => Ok(SmokeMode::Base),
            "extended" => Ok(SmokeMode::Extended),
            "gate" => Ok(SmokeMode::Gate),
            other => Err(format!("unknown smoke mode '{}'", other)),
        }
    }
}

/// A report as read from storage, tagged with the kind it claims to be.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport {
    pub kind: ReportKind,
    pub value: Value,
}

impl RawReport {
    pub fn new(kind: ReportKind, value: Value) -> Self {
        Self { kind, value }
    }
}
