//! Failure fingerprints.
//!
//! The first failed step of a run is reduced to a canonical signature
//! `stepId=<id>|exitCode=<n>|output=<line>` and hashed, so identical failures
//! across runs collapse to the same fingerprint.

use crate::report::StepStatus;
use crate::util::{collapse_whitespace, first_output_line};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

pub const FINGERPRINT_HASH_ALGORITHM: &str = "sha256";

/// Execution outcome of one step, in run order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub id: String,
    pub command: Option<String>,
    pub status: StepStatus,
    pub exit_code: Option<i64>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureFingerprint {
    pub step_id: String,
    pub command: Option<String>,
    pub exit_code: Option<i64>,
    pub first_output_line: String,
    pub signature: String,
    pub hash_algorithm: String,
    pub hash: String,
}

/// Fingerprint the first failed step, or `None` when nothing failed.
///
/// The output line is the first line with visible text after whitespace is
/// collapsed. Leading blank lines that some runners print before the real
/// error are skipped, so they never produce an empty `output=` signature.
pub fn fingerprint(steps: &[StepOutcome]) -> Option<FailureFingerprint> {
    let step = steps.iter().find(|step| step.status == StepStatus::Failed)?;
    let first_line = step
        .output
        .as_deref()
        .and_then(first_output_line)
        .unwrap_or_default();
    let signature = build_signature(&step.id, step.exit_code, &first_line);
    let hash = sha256_hex(&signature);
    debug!(step_id = %step.id, hash = %hash, "computed failure fingerprint");

    Some(FailureFingerprint {
        step_id: step.id.clone(),
        command: step.command.clone(),
        exit_code: step.exit_code,
        first_output_line: first_line,
        signature,
        hash_algorithm: FINGERPRINT_HASH_ALGORITHM.to_string(),
        hash,
    })
}

pub fn build_signature(step_id: &str, exit_code: Option<i64>, output_line: &str) -> String {
    let exit_code = exit_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| "null".to_string());
    format!(
        "stepId={}|exitCode={}|output={}",
        step_id,
        exit_code,
        collapse_whitespace(output_line)
    )
}

pub fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, status: StepStatus, exit_code: i64, output: &str) -> StepOutcome {
        StepOutcome {
            id: id.to_string(),
            command: Some(format!("npm run {}", id)),
            status,
            exit_code: Some(exit_code),
            output: Some(output.to_string()),
        }
    }

    #[test]
    fn no_failed_step_yields_none() {
        let steps = vec![
            outcome("lint", StepStatus::Success, 0, "ok"),
            outcome("docs", StepStatus::Skipped, 0, ""),
        ];
        assert_eq!(fingerprint(&steps), None);
        assert_eq!(fingerprint(&[]), None);
    }

    #[test]
    fn first_failed_step_is_the_subject() {
        let steps = vec![
            outcome("lint", StepStatus::Success, 0, "ok"),
            outcome("unit", StepStatus::Failed, 1, "  FAIL   src/a.test.ts\nmore"),
            outcome("e2e", StepStatus::Failed, 2, "timeout"),
        ];
        let fp = fingerprint(&steps).unwrap();
        assert_eq!(fp.step_id, "unit");
        assert_eq!(fp.first_output_line, "FAIL src/a.test.ts");
        assert_eq!(fp.signature, "stepId=unit|exitCode=1|output=FAIL src/a.test.ts");
        assert_eq!(fp.hash_algorithm, "sha256");
        assert_eq!(fp.hash, sha256_hex(&fp.signature));
        assert_eq!(fp.hash.len(), 64);
    }

    #[test]
    fn leading_blank_output_lines_are_skipped() {
        let steps = vec![outcome("e2e", StepStatus::Failed, 2, "\n   \n\tTimeoutError: page.goto\nstack")];
        let fp = fingerprint(&steps).unwrap();
        assert_eq!(fp.first_output_line, "TimeoutError: page.goto");
        assert_eq!(fp.signature, "stepId=e2e|exitCode=2|output=TimeoutError: page.goto");
    }

    #[test]
    fn reordering_later_steps_keeps_the_fingerprint() {
        let a = vec![
            outcome("unit", StepStatus::Failed, 1, "boom"),
            outcome("e2e", StepStatus::Failed, 2, "x"),
            outcome("perf", StepStatus::Success, 0, ""),
        ];
        let b = vec![
            outcome("unit", StepStatus::Failed, 1, "boom"),
            outcome("perf", StepStatus::Success, 0, ""),
            outcome("e2e", StepStatus::Failed, 2, "x"),
        ];
        assert_eq!(fingerprint(&a).unwrap().hash, fingerprint(&b).unwrap().hash);
    }

    #[test]
    fn hash_is_deterministic_and_sensitive_to_each_component() {
        let base = fingerprint(&[outcome("unit", StepStatus::Failed, 1, "boom")]).unwrap();
        let same = fingerprint(&[outcome("unit", StepStatus::Failed, 1, "  boom  ")]).unwrap();
        assert_eq!(base.hash, same.hash);

        let other_id = fingerprint(&[outcome("unit2", StepStatus::Failed, 1, "boom")]).unwrap();
        let other_code = fingerprint(&[outcome("unit", StepStatus::Failed, 2, "boom")]).unwrap();
        let other_line = fingerprint(&[outcome("unit", StepStatus::Failed, 1, "bang")]).unwrap();
        assert_ne!(base.hash, other_id.hash);
        assert_ne!(base.hash, other_code.hash);
        assert_ne!(base.hash, other_line.hash);
    }

    #[test]
    fn command_does_not_participate_in_the_hash() {
        let mut a = outcome("unit", StepStatus::Failed, 1, "boom");
        let b = a.clone();
        a.command = Some("cargo test".to_string());
        assert_eq!(fingerprint(&[a]).unwrap().hash, fingerprint(&[b]).unwrap().hash);
    }

    #[test]
    fn missing_exit_code_and_output_are_spelled_out() {
        let step = StepOutcome {
            id: "db".to_string(),
            command: None,
            status: StepStatus::Failed,
            exit_code: None,
            output: None,
        };
        let fp = fingerprint(&[step]).unwrap();
        assert_eq!(fp.signature, "stepId=db|exitCode=null|output=");
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
