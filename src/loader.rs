//! Reading report files from disk.

use crate::report::{RawReport, ReportKind};
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

pub fn read_report(kind: ReportKind, path: &Path) -> Result<RawReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    parse_report(kind, path, &content)
}

/// Like [`read_report`], but a file that does not exist is `Ok(None)`.
pub fn read_optional_report(kind: ReportKind, path: &Path) -> Result<Option<RawReport>> {
    match fs::read_to_string(path) {
        Ok(content) => parse_report(kind, path, &content).map(Some),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "optional report not present");
            Ok(None)
        }
        Err(error) => {
            Err(error).with_context(|| format!("Failed to read report {}", path.display()))
        }
    }
}

fn parse_report(kind: ReportKind, path: &Path, content: &str) -> Result<RawReport> {
    let value = serde_json::from_str(content)
        .with_context(|| format!("Failed to parse report {}", path.display()))?;
    debug!(kind = %kind, path = %path.display(), bytes = content.len(), "read report");
    Ok(RawReport::new(kind, value))
}
