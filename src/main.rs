use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use gatecheck::config::{load_thresholds_file, resolve_thresholds, PartialThresholds};
use gatecheck::guidance::{ArtifactKey, ArtifactPaths, DEFAULT_SNAPSHOT_MAX_CHARS};
use gatecheck::loader::read_report;
use gatecheck::logging::init_logging;
use gatecheck::pipeline::{
    read_error_summary, validate_batch, validate_path, validate_trend_paths, CommonOptions, KindOptions,
    TrendRequest, ValidationRequest,
};
use gatecheck::quick_locate::QuickLocateChain;
use gatecheck::report::{ReportKind, SmokeMode};
use gatecheck::summary::ValidationSummary;
use gatecheck::validate::quality_gate::ExpectedArtifacts;
use gatecheck::validate::{BaselineOptions, PerfOptions, QualityGateOptions, SmokeOptions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    name = "gatecheck",
    about = "Validate CI quality-gate reports and explain the first failure",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a smoke-run report
    Smoke(SmokeArgs),
    /// Validate a perf report
    Perf(PerfArgs),
    /// Validate an execution-baseline report
    Baseline(BaselineArgs),
    /// Validate a quality-gate report
    QualityGate(QualityGateArgs),
    /// Compare an execution baseline against a reference baseline
    Trend(TrendArgs),
    /// Validate several reports of different kinds in one pass
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Write the summary JSON here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    /// Reason code from the producing job; overrides classification when known
    #[arg(long)]
    failure_reason_code: Option<String>,
    /// Artifact path used in remediation commands, as KEY=PATH (e.g. perfReport=out/perf.json)
    #[arg(long = "artifact", value_parser = parse_artifact)]
    artifacts: Vec<(ArtifactKey, String)>,
    #[arg(long, default_value_t = DEFAULT_SNAPSHOT_MAX_CHARS)]
    snapshot_max_chars: usize,
}

impl CommonArgs {
    fn options(&self) -> CommonOptions {
        let mut artifact_paths = ArtifactPaths::new();
        for (key, path) in &self.artifacts {
            artifact_paths.set(*key, path.as_str());
        }
        CommonOptions {
            failure_reason_code: self.failure_reason_code.clone(),
            artifact_paths,
            snapshot_max_chars: self.snapshot_max_chars,
        }
    }
}

#[derive(Args, Debug)]
struct SmokeArgs {
    #[arg(long)]
    report: PathBuf,
    #[arg(long, default_value = "1")]
    schema_version: String,
    /// Expected run mode: base, extended or gate
    #[arg(long)]
    mode: Option<SmokeMode>,
    /// Resolve quick locate with the self-check priority order
    #[arg(long)]
    self_check: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct PerfArgs {
    #[arg(long)]
    report: PathBuf,
    #[arg(long, default_value = "1")]
    schema_version: String,
    /// Scenario that must be present; repeatable. Defaults to the built-in set.
    #[arg(long = "required-scenario")]
    required_scenarios: Vec<String>,
    #[arg(long)]
    require_no_threshold_violations: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct BaselineArgs {
    #[arg(long)]
    report: PathBuf,
    #[arg(long, default_value = "1")]
    schema_version: String,
    #[arg(long)]
    require_gate_pass: bool,
    #[arg(long)]
    require_no_warnings: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct QualityGateArgs {
    #[arg(long)]
    report: PathBuf,
    #[arg(long, default_value = "1")]
    schema_version: String,
    #[arg(long)]
    smoke_report: Option<String>,
    #[arg(long)]
    perf_report: Option<String>,
    #[arg(long)]
    summary_json: Option<String>,
    #[arg(long)]
    summary_markdown: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct TrendArgs {
    #[arg(long)]
    current: PathBuf,
    #[arg(long)]
    reference: PathBuf,
    /// JSON or TOML file with a `trend` section
    #[arg(long)]
    thresholds: Option<PathBuf>,
    #[arg(long)]
    max_success_rate_drop: Option<f64>,
    #[arg(long)]
    max_failed_rate_increase: Option<f64>,
    #[arg(long)]
    max_timeout_rate_increase: Option<f64>,
    #[arg(long)]
    max_p95_duration_increase_ms: Option<f64>,
    #[arg(long)]
    allow_missing_reference: bool,
    #[arg(long, default_value = "1")]
    schema_version: String,
    #[arg(long)]
    require_gate_pass: bool,
    #[arg(long)]
    require_no_warnings: bool,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[arg(long)]
    smoke: Option<PathBuf>,
    #[arg(long)]
    perf: Option<PathBuf>,
    #[arg(long)]
    baseline: Option<PathBuf>,
    #[arg(long)]
    quality_gate: Option<PathBuf>,
    #[command(flatten)]
    common: CommonArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Smoke(args) => run_smoke(args),
        Commands::Perf(args) => run_perf(args),
        Commands::Baseline(args) => run_baseline(args),
        Commands::QualityGate(args) => run_quality_gate(args),
        Commands::Trend(args) => run_trend(args),
        Commands::Check(args) => run_check(args),
    }
}

fn run_smoke(args: SmokeArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let options = SmokeOptions {
        expected_schema_version: args.schema_version,
        expected_mode: args.mode,
        quick_locate_chain: if args.self_check {
            QuickLocateChain::SelfCheck
        } else {
            QuickLocateChain::Summary
        },
    };
    let summary = validate_path(
        &args.report,
        KindOptions::Smoke(options),
        args.common.options(),
        Utc::now(),
    );
    finish(&summary, args.common.output.as_deref())
}

fn run_perf(args: PerfArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let mut options = PerfOptions {
        expected_schema_version: args.schema_version,
        require_no_threshold_violations: args.require_no_threshold_violations,
        ..PerfOptions::default()
    };
    if !args.required_scenarios.is_empty() {
        options.required_scenarios = args.required_scenarios;
    }
    let summary = validate_path(
        &args.report,
        KindOptions::Perf(options),
        args.common.options(),
        Utc::now(),
    );
    finish(&summary, args.common.output.as_deref())
}

fn run_baseline(args: BaselineArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let options = BaselineOptions {
        expected_schema_version: args.schema_version,
        require_gate_pass: args.require_gate_pass,
        require_no_warnings: args.require_no_warnings,
    };
    let summary = validate_path(
        &args.report,
        KindOptions::Baseline(options),
        args.common.options(),
        Utc::now(),
    );
    finish(&summary, args.common.output.as_deref())
}

fn run_quality_gate(args: QualityGateArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let options = QualityGateOptions {
        expected_schema_version: args.schema_version,
        report_path: None,
        expected_artifacts: ExpectedArtifacts {
            smoke_report_path: args.smoke_report,
            perf_report_path: args.perf_report,
            summary_markdown_path: args.summary_markdown,
            summary_json_path: args.summary_json,
        },
    };
    let summary = validate_path(
        &args.report,
        KindOptions::QualityGate(options),
        args.common.options(),
        Utc::now(),
    );
    finish(&summary, args.common.output.as_deref())
}

fn run_trend(args: TrendArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let overrides = PartialThresholds {
        max_success_rate_drop: args.max_success_rate_drop,
        max_failed_rate_increase: args.max_failed_rate_increase,
        max_timeout_rate_increase: args.max_timeout_rate_increase,
        max_p95_duration_increase_ms: args.max_p95_duration_increase_ms,
    };
    overrides.validate().context("Invalid threshold override")?;
    let file = args
        .thresholds
        .as_deref()
        .map(load_thresholds_file)
        .transpose()?;
    let thresholds = resolve_thresholds(&overrides, file.as_ref());
    debug!(?thresholds, "resolved trend thresholds");

    let mut common = args.common.options();
    if let Some(path) = &args.thresholds {
        if common.artifact_paths.get(ArtifactKey::Thresholds).is_none() {
            common
                .artifact_paths
                .set(ArtifactKey::Thresholds, path.display().to_string());
        }
    }
    let request = TrendRequest {
        current_path: args.current.display().to_string(),
        reference_path: args.reference.display().to_string(),
        thresholds,
        allow_missing_reference: args.allow_missing_reference,
        baseline: BaselineOptions {
            expected_schema_version: args.schema_version,
            require_gate_pass: args.require_gate_pass,
            require_no_warnings: args.require_no_warnings,
        },
        common,
    };
    let summary = validate_trend_paths(&request, Utc::now());
    finish(&summary, args.common.output.as_deref())
}

fn run_check(args: CheckArgs) -> Result<()> {
    init_logging(args.common.verbose);
    let common = args.common.options();
    let now = Utc::now();
    let inputs = [
        (ReportKind::Smoke, &args.smoke),
        (ReportKind::Perf, &args.perf),
        (ReportKind::ExecutionBaseline, &args.baseline),
        (ReportKind::QualityGate, &args.quality_gate),
    ];

    let mut requests = Vec::new();
    let mut unreadable = Vec::new();
    for (kind, path) in inputs {
        let Some(path) = path else { continue };
        let source_path = path.display().to_string();
        match read_report(kind, path) {
            Ok(report) => requests.push(ValidationRequest {
                report,
                source_path: Some(source_path),
                options: KindOptions::default_for(kind),
                common: common.clone(),
            }),
            Err(error) => unreadable.push(read_error_summary(kind, &source_path, &error, &common, now)),
        }
    }
    if requests.is_empty() && unreadable.is_empty() {
        return Err(anyhow!(
            "No reports given; pass at least one of --smoke, --perf, --baseline, --quality-gate"
        ));
    }

    let mut summaries = validate_batch(&requests, now);
    summaries.extend(unreadable);
    let passed = summaries.iter().all(ValidationSummary::passed);
    match args.common.output.as_deref() {
        Some(path) => write_report_json(path, &summaries)?,
        None => println!("{}", serde_json::to_string_pretty(&summaries)?),
    }
    for summary in &summaries {
        print_status(summary);
    }
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}

fn finish(summary: &ValidationSummary, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            write_report_json(path, summary)?;
            info!(path = %path.display(), "wrote validation summary");
        }
        None => println!("{}", summary.to_json_pretty()?),
    }
    print_status(summary);
    if !summary.passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_status(summary: &ValidationSummary) {
    eprintln!("{}: {}", summary.report_kind, summary.status.as_str());
    if let Some(code) = summary.guidance.reason_code {
        eprintln!("  Reason: {}", code);
        eprintln!("  Action: {}", summary.guidance.suggested_action);
        eprintln!("  Command: {}", summary.guidance.suggested_command);
    }
}

fn parse_artifact(raw: &str) -> Result<(ArtifactKey, String), String> {
    let (key, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=PATH, got '{}'", raw))?;
    let key: ArtifactKey = serde_json::from_value(serde_json::Value::String(key.trim().to_string()))
        .map_err(|_| format!("unknown artifact key '{}'", key))?;
    if path.is_empty() {
        return Err(format!("artifact '{}' has an empty path", raw));
    }
    Ok((key, path.to_string()))
}

fn write_report_json<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory '{}'", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_artifact_overrides() {
        assert_eq!(
            parse_artifact("perfReport=out/perf.json").unwrap(),
            (ArtifactKey::PerfReport, "out/perf.json".to_string())
        );
        assert!(parse_artifact("perfReport").is_err());
        assert!(parse_artifact("nope=x").is_err());
        assert!(parse_artifact("summaryJson=").is_err());
    }

    #[test]
    fn trend_flags_match_guidance_commands() {
        let cli = Cli::try_parse_from([
            "gatecheck",
            "trend",
            "--current",
            "a.json",
            "--reference",
            "b.json",
            "--thresholds",
            "t.toml",
            "--max-p95-duration-increase-ms",
            "2500",
        ])
        .unwrap();
        let Commands::Trend(args) = cli.command else {
            panic!("expected trend subcommand");
        };
        assert_eq!(args.max_p95_duration_increase_ms, Some(2500.0));
        assert_eq!(args.thresholds, Some(PathBuf::from("t.toml")));
    }

    #[test]
    fn smoke_mode_parses_from_flag() {
        let cli = Cli::try_parse_from(["gatecheck", "smoke", "--report", "s.json", "--mode", "gate"]).unwrap();
        let Commands::Smoke(args) = cli.command else {
            panic!("expected smoke subcommand");
        };
        assert_eq!(args.mode, Some(SmokeMode::Gate));
        assert!(Cli::try_parse_from(["gatecheck", "smoke", "--report", "s.json", "--mode", "x"]).is_err());
    }

    #[test]
    fn writes_summary_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.json");
        write_report_json(&path, &serde_json::json!({"status": "SUCCESS"})).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["status"], "SUCCESS");
    }
}
