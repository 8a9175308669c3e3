//! Gatecheck library crate
//!
//! Validates CI quality-gate reports (smoke, perf, execution baseline and the
//! quality-gate aggregate), detects regression trends between baselines, and
//! turns the first failure into a reason code with a remediation command.

pub mod config;
pub mod fingerprint;
pub mod guidance;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod quick_locate;
pub mod report;
pub mod summary;
pub mod trend;
pub mod util;
pub mod validate;
