//! Clawlist sweep tool: analyzes finished runs offline.
//!
//! ```text
//! clawlist-sweep analyze <sweep_dir> [--csv]
//! clawlist-sweep audit <run_dir>
//! clawlist-sweep scenario <scenario.json>
//! ```

use std::path::Path;
use std::process::ExitCode;

use clawlist_audit::{audit_path_for_run, summarize, AuditError};
use clawlist_sweep::{analyze_sweep, export_csv, format_report};
use clawlist_types::{IssueSeverity, Scenario};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  clawlist-sweep analyze <sweep_dir> [--csv]
  clawlist-sweep audit <run_dir>
  clawlist-sweep scenario <scenario.json>";

/// Success rate below which `analyze` exits non-zero.
const MIN_SUCCESS_RATE: f64 = 0.5;

fn init_tracing() {
    let level = std::env::var("CLAWLIST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("CLAWLIST_LOG_JSON").is_ok_and(|v| v == "true" || v == "1");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with("--"))
        .collect();
    let csv = args.iter().any(|a| a == "--csv");

    match positional.as_slice() {
        ["analyze", sweep_dir] => analyze(Path::new(sweep_dir), csv),
        ["audit", run_dir] => audit(Path::new(run_dir)),
        ["scenario", file] => scenario(Path::new(file)),
        _ => {
            eprintln!("{USAGE}");
            ExitCode::FAILURE
        }
    }
}

fn analyze(sweep_dir: &Path, csv: bool) -> ExitCode {
    tracing::info!(sweep = %sweep_dir.display(), "analyzing sweep");

    let stats = match analyze_sweep(sweep_dir) {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "sweep analysis failed");
            return ExitCode::FAILURE;
        }
    };

    let markdown = format_report(&stats);
    let md_path = sweep_dir.join("sweep-stats.md");
    if let Err(e) = std::fs::write(&md_path, &markdown) {
        tracing::error!(error = %e, path = %md_path.display(), "failed to write report");
        return ExitCode::FAILURE;
    }
    tracing::info!(path = %md_path.display(), "wrote report");

    if csv {
        let csv_path = sweep_dir.join("sweep-data.csv");
        if let Err(e) = std::fs::write(&csv_path, export_csv(&stats)) {
            tracing::error!(error = %e, path = %csv_path.display(), "failed to write CSV");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %csv_path.display(), "wrote CSV");
    }

    println!("{markdown}");

    if stats.success_rate < MIN_SUCCESS_RATE {
        tracing::warn!(
            success_rate = %format!("{:.1}%", stats.success_rate * 100.0),
            "low success rate"
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn audit(run_dir: &Path) -> ExitCode {
    let path = audit_path_for_run(run_dir);
    tracing::info!(path = %path.display(), "analyzing audit log");

    let summary = match summarize(&path) {
        Ok(summary) => summary,
        Err(AuditError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("no audit log found, run may not have security logging enabled");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read audit log");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", summary.render_markdown());

    if summary.constraint_violations > 0 {
        tracing::warn!(
            violations = summary.constraint_violations,
            "security violations detected"
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn scenario(file: &Path) -> ExitCode {
    let scenario: Scenario = match std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!(error = %e, path = %file.display(), "failed to load scenario");
            return ExitCode::FAILURE;
        }
    };

    let issues = scenario.validate();
    for issue in &issues {
        let label = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        println!("{label}: {}: {}", issue.field, issue.message);
    }

    if scenario.is_valid() {
        println!("scenario '{}' is valid", scenario.name);
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
