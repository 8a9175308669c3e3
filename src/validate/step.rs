use crate::fingerprint::StepOutcome;
use crate::report::StepStatus;
use crate::util::first_output_line;
use crate::validate::fields::{Findings, Object};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

const STEP_STATUSES: &str = "SUCCESS|FAILED|SKIPPED";

/// Recommended command a step documented for itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepQuickLocate {
    pub command: Option<String>,
    pub first_failed_output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProjection {
    pub id: Option<String>,
    pub name: Option<String>,
    pub command: Option<String>,
    pub status: Option<StepStatus>,
    pub attempt_count: Option<usize>,
    pub retry_count: Option<u64>,
    pub exit_code: Option<i64>,
    pub total_duration_ms: Option<f64>,
    pub first_output_line: Option<String>,
    #[serde(skip)]
    pub output: Option<String>,
    pub quick_locate: Option<StepQuickLocate>,
}

impl StepProjection {
    pub fn is_failed(&self) -> bool {
        self.status == Some(StepStatus::Failed)
    }

    pub fn outcome(&self) -> Option<StepOutcome> {
        Some(StepOutcome {
            id: self.id.clone()?,
            command: self.command.clone(),
            status: self.status?,
            exit_code: self.exit_code,
            output: self.output.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepsProjection {
    pub steps: Vec<StepProjection>,
    /// True when every step passed its own structural checks.
    pub complete: bool,
}

impl StepsProjection {
    pub fn count_with(&self, status: StepStatus) -> u64 {
        self.steps
            .iter()
            .filter(|step| step.status == Some(status))
            .count() as u64
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|step| step.is_failed())
            .filter_map(|step| step.id.clone())
            .collect()
    }

    pub fn first_failed(&self) -> Option<&StepProjection> {
        self.steps.iter().find(|step| step.is_failed())
    }

    pub fn total_retries(&self) -> u64 {
        self.steps.iter().filter_map(|step| step.retry_count).sum()
    }

    pub fn outcomes(&self) -> Vec<StepOutcome> {
        self.steps.iter().filter_map(StepProjection::outcome).collect()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.steps.iter().any(|step| step.id.as_deref() == Some(id))
    }
}

pub fn validate_steps(items: &[Value], parent: &str, findings: &mut Findings) -> StepsProjection {
    let errors_before = findings.errors.len();
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(items.len());

    for (idx, item) in items.iter().enumerate() {
        let path = format!("{}[{}]", parent, idx);
        let Some(obj) = findings.as_object(item, &path) else {
            continue;
        };
        let step = validate_step(obj, &path, findings);
        if let Some(id) = step.id.as_deref() {
            if !seen.insert(id.to_string()) {
                findings.error(format!("{}: duplicate step id '{}'", path, id));
            }
        }
        steps.push(step);
    }

    StepsProjection {
        steps,
        complete: findings.errors.len() == errors_before,
    }
}

fn validate_step(obj: &Object, path: &str, findings: &mut Findings) -> StepProjection {
    let id = findings.string(obj, path, "id").map(str::to_string);
    let name = findings.string(obj, path, "name").map(str::to_string);
    let command = findings.string(obj, path, "command").map(str::to_string);
    let status = findings.enumerated::<StepStatus>(obj, path, "status", STEP_STATUSES);

    let attempts = validate_attempts(obj, path, findings);
    let declared_retries = findings.count(obj, path, "retryCount");

    let mut retry_count = None;
    if let Some(attempts) = &attempts {
        let derived = attempts.len() as u64 - 1;
        retry_count = Some(derived);
        if let Some(declared) = declared_retries {
            if declared != derived {
                findings.error(format!(
                    "{}.retryCount mismatch: expected {}, actual {}",
                    path, derived, declared
                ));
            }
        }
    }

    let exit_code = attempts
        .as_ref()
        .and_then(|attempts| attempts.last())
        .map(|attempt| attempt.exit_code);

    if let (Some(status), Some(exit_code)) = (status, exit_code) {
        match status {
            StepStatus::Success if exit_code != 0 => findings.error(format!(
                "{} status conflict: status SUCCESS but final attempt exited {}",
                path, exit_code
            )),
            StepStatus::Failed if exit_code == 0 => findings.error(format!(
                "{} status conflict: status FAILED but final attempt exited 0",
                path
            )),
            _ => {}
        }
    }

    let output = findings
        .optional_string(obj, path, "output")
        .flatten()
        .map(str::to_string);
    let first_output_line = output.as_deref().and_then(first_output_line);
    let quick_locate = validate_step_quick_locate(obj, path, findings);

    StepProjection {
        id,
        name,
        command,
        status,
        attempt_count: attempts.as_ref().map(Vec::len),
        retry_count,
        exit_code,
        total_duration_ms: attempts
            .as_ref()
            .map(|attempts| attempts.iter().map(|a| a.duration_ms).sum()),
        first_output_line,
        output,
        quick_locate,
    }
}

struct Attempt {
    exit_code: i64,
    duration_ms: f64,
}

/// `None` unless every attempt is well formed.
fn validate_attempts(obj: &Object, path: &str, findings: &mut Findings) -> Option<Vec<Attempt>> {
    let items = findings.non_empty_array(obj, path, "attempts")?;
    let mut attempts = Vec::with_capacity(items.len());
    let mut valid = true;

    for (idx, item) in items.iter().enumerate() {
        let attempt_path = format!("{}.attempts[{}]", path, idx);
        let Some(attempt) = findings.as_object(item, &attempt_path) else {
            valid = false;
            continue;
        };

        let index = findings.count(attempt, &attempt_path, "attempt");
        if let Some(index) = index {
            let expected = idx as u64 + 1;
            if index != expected {
                findings.error(format!(
                    "{}.attempt must be {} (1-based, sequential), got {}",
                    attempt_path, expected, index
                ));
            }
        }
        let exit_code = findings.integer(attempt, &attempt_path, "exitCode");
        let duration_ms = findings.non_negative_number(attempt, &attempt_path, "durationMs");

        match (index, exit_code, duration_ms) {
            (Some(_), Some(exit_code), Some(duration_ms)) => attempts.push(Attempt {
                exit_code,
                duration_ms,
            }),
            _ => valid = false,
        }
    }

    valid.then_some(attempts)
}

fn validate_step_quick_locate(
    obj: &Object,
    path: &str,
    findings: &mut Findings,
) -> Option<StepQuickLocate> {
    let value = obj.get("quickLocate")?;
    if value.is_null() {
        return None;
    }
    let ql_path = format!("{}.quickLocate", path);
    let ql = findings.as_object(value, &ql_path)?;
    let command = findings
        .optional_string(ql, &ql_path, "command")
        .flatten()
        .map(str::to_string);
    let first_failed_output = findings
        .optional_string(ql, &ql_path, "firstFailedOutput")
        .flatten()
        .map(str::to_string);
    Some(StepQuickLocate {
        command,
        first_failed_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, status: &str, exit_codes: &[i64]) -> Value {
        let attempts: Vec<Value> = exit_codes
            .iter()
            .enumerate()
            .map(|(idx, code)| json!({"attempt": idx + 1, "exitCode": code, "durationMs": 120}))
            .collect();
        json!({
            "id": id,
            "name": format!("step {}", id),
            "command": format!("npm run {}", id),
            "status": status,
            "attempts": attempts,
            "retryCount": exit_codes.len() - 1,
        })
    }

    #[test]
    fn well_formed_steps_are_complete() {
        let items = vec![step("lint", "SUCCESS", &[0]), step("test", "FAILED", &[1, 1])];
        let mut findings = Findings::new();
        let projection = validate_steps(&items, "steps", &mut findings);
        assert!(findings.errors.is_empty(), "{:?}", findings.errors);
        assert!(projection.complete);
        assert_eq!(projection.total_retries(), 1);
        assert_eq!(projection.failed_ids(), vec!["test"]);
        assert_eq!(projection.steps[1].exit_code, Some(1));
        assert_eq!(projection.steps[1].total_duration_ms, Some(240.0));
    }

    #[test]
    fn retry_count_must_match_attempts() {
        let mut raw = step("test", "SUCCESS", &[1, 0]);
        raw["retryCount"] = json!(3);
        let mut findings = Findings::new();
        let projection = validate_steps(&[raw], "steps", &mut findings);
        assert_eq!(
            findings.errors,
            vec!["steps[0].retryCount mismatch: expected 1, actual 3"]
        );
        assert!(!projection.complete);
        assert_eq!(projection.steps[0].retry_count, Some(1));
    }

    #[test]
    fn attempt_indices_must_be_one_based() {
        let mut raw = step("test", "SUCCESS", &[0]);
        raw["attempts"][0]["attempt"] = json!(0);
        let mut findings = Findings::new();
        validate_steps(&[raw], "steps", &mut findings);
        assert_eq!(findings.errors.len(), 1);
        assert!(findings.errors[0].contains("1-based"));
    }

    #[test]
    fn negative_duration_and_missing_exit_code_are_structural_errors() {
        let mut raw = step("test", "SUCCESS", &[0]);
        raw["attempts"][0]["durationMs"] = json!(-5);
        raw["attempts"][0]
            .as_object_mut()
            .unwrap()
            .remove("exitCode");
        let mut findings = Findings::new();
        let projection = validate_steps(&[raw], "steps", &mut findings);
        assert_eq!(findings.errors.len(), 2);
        assert_eq!(projection.steps[0].attempt_count, None);
        assert_eq!(projection.steps[0].retry_count, None);
    }

    #[test]
    fn empty_attempts_are_rejected() {
        let mut raw = step("test", "SUCCESS", &[0]);
        raw["attempts"] = json!([]);
        let mut findings = Findings::new();
        validate_steps(&[raw], "steps", &mut findings);
        assert!(findings
            .errors
            .iter()
            .any(|e| e == "steps[0].attempts must not be empty"));
    }

    #[test]
    fn status_must_agree_with_final_exit_code() {
        let items = vec![step("a", "SUCCESS", &[2]), step("b", "FAILED", &[0])];
        let mut findings = Findings::new();
        validate_steps(&items, "steps", &mut findings);
        assert_eq!(findings.errors.len(), 2);
        assert!(findings.errors.iter().all(|e| e.contains("status conflict")));
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let items = vec![step("a", "SUCCESS", &[0]), step("a", "SUCCESS", &[0])];
        let mut findings = Findings::new();
        validate_steps(&items, "steps", &mut findings);
        assert_eq!(findings.errors, vec!["steps[1]: duplicate step id 'a'"]);
    }

    #[test]
    fn output_and_quick_locate_override_are_projected() {
        let mut raw = step("db", "FAILED", &[1]);
        raw["output"] = json!("\n  Error:   connect ECONNREFUSED  \nat foo");
        raw["quickLocate"] = json!({"command": "npm run db:check", "firstFailedOutput": "boom"});
        let mut findings = Findings::new();
        let projection = validate_steps(&[raw], "steps", &mut findings);
        let step = &projection.steps[0];
        assert_eq!(
            step.first_output_line.as_deref(),
            Some("Error: connect ECONNREFUSED")
        );
        assert_eq!(
            step.quick_locate.as_ref().and_then(|q| q.command.as_deref()),
            Some("npm run db:check")
        );
        let outcome = step.outcome().unwrap();
        assert_eq!(outcome.id, "db");
        assert_eq!(outcome.exit_code, Some(1));
    }
}
