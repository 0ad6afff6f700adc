//! Discovery and loading of run directories inside a sweep.
//!
//! A sweep directory holds one sub-directory per run, named
//! `<prefix>_<index>`. Each run records its outcome in
//! `out/summary.json` and, when security logging was on, its decisions in
//! `out/audit.jsonl`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use clawlist_audit::{audit_path_for_run, summarize, AuditSummary};
use clawlist_types::RunOutcome;
use regex::Regex;
use serde::Deserialize;

use crate::error::SweepError;

static RUN_DIR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+_\d+$").expect("run directory pattern"));

/// Outcome and metrics of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub outcome: RunOutcome,
    pub deal_reached: bool,
    pub final_price: Option<f64>,
    pub t_first_dm_sec: Option<f64>,
    pub offer_count: u32,
    /// Violation codes recorded by the run harness.
    pub violations: Vec<String>,
    /// Summary of the run's audit log, when it has one.
    pub audit: Option<AuditSummary>,
}

/// On-disk shape of `summary.json`. Every field may be missing or `null`;
/// crashed runs often write partial summaries and still have to count.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryFile {
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    result: Option<RunOutcome>,
    #[serde(default)]
    deal_reached: Option<bool>,
    #[serde(default)]
    final_price: Option<f64>,
    #[serde(default)]
    metrics: Option<SummaryMetrics>,
    #[serde(default)]
    violations: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryMetrics {
    #[serde(default)]
    t_first_dm_sec: Option<f64>,
    #[serde(default)]
    offer_count: Option<u32>,
}

/// Returns `true` for directory names of the form `<prefix>_<digits>`.
pub fn is_run_dir_name(name: &str) -> bool {
    RUN_DIR_NAME.is_match(name)
}

/// Lists run directories of `sweep_dir`, sorted by name.
///
/// # Errors
///
/// Returns `SweepError::Io` if `sweep_dir` itself cannot be listed. Entries
/// that cannot be read are logged and skipped.
pub fn discover_runs(sweep_dir: &Path) -> Result<Vec<PathBuf>, SweepError> {
    let mut runs = Vec::new();
    for entry in fs::read_dir(sweep_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    sweep = %sweep_dir.display(),
                    error = %e,
                    "unreadable directory entry"
                );
                continue;
            }
        };
        match entry.file_type() {
            Ok(kind) if kind.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "cannot stat entry");
                continue;
            }
        }
        if entry.file_name().to_str().is_some_and(is_run_dir_name) {
            runs.push(entry.path());
        }
    }
    runs.sort();
    Ok(runs)
}

/// Parses the contents of a `summary.json`. `fallback_id` is used when the
/// file carries no `runId`.
pub fn parse_run_summary(content: &str, fallback_id: &str) -> Result<RunSummary, SweepError> {
    let file: SummaryFile = serde_json::from_str(content)?;
    let deal_reached = file.deal_reached.unwrap_or(false);
    let outcome = file
        .result
        .unwrap_or_else(|| RunOutcome::from_deal_reached(deal_reached));
    let metrics = file.metrics.unwrap_or_default();
    Ok(RunSummary {
        run_id: file
            .run_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| fallback_id.to_string()),
        outcome,
        deal_reached,
        final_price: file.final_price,
        t_first_dm_sec: metrics.t_first_dm_sec,
        offer_count: metrics.offer_count.unwrap_or(0),
        violations: file.violations.unwrap_or_default(),
        audit: None,
    })
}

/// Loads one run directory. Returns `None` (and logs why) when the run has
/// no readable summary.
pub fn load_run_summary(run_dir: &Path) -> Option<RunSummary> {
    let dir_name = run_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary_path = run_dir.join("out").join("summary.json");

    let content = match fs::read_to_string(&summary_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(run = %dir_name, error = %e, "skipping run without summary");
            return None;
        }
    };
    let mut summary = match parse_run_summary(&content, &dir_name) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::warn!(run = %dir_name, error = %e, "skipping run with malformed summary");
            return None;
        }
    };

    let audit_path = audit_path_for_run(run_dir);
    if audit_path.exists() {
        match summarize(&audit_path) {
            Ok(audit) => summary.audit = Some(audit),
            Err(e) => tracing::warn!(run = %dir_name, error = %e, "unreadable audit log"),
        }
    }
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_dir_names() {
        assert!(is_run_dir_name("sweep_1"));
        assert!(is_run_dir_name("live_run_42"));
        assert!(!is_run_dir_name("_1"));
        assert!(!is_run_dir_name("sweep_"));
        assert!(!is_run_dir_name("sweep_1a"));
        assert!(!is_run_dir_name("reports"));
    }

    #[test]
    fn explicit_result_wins() {
        let summary = parse_run_summary(
            r#"{"runId":"r7","result":"fail","dealReached":true,"finalPrice":150}"#,
            "sweep_7",
        )
        .unwrap();
        assert_eq!(summary.run_id, "r7");
        assert_eq!(summary.outcome, RunOutcome::Fail);
        assert_eq!(summary.final_price, Some(150.0));
    }

    #[test]
    fn missing_result_derives_from_deal_flag() {
        let deal = parse_run_summary(r#"{"dealReached":true}"#, "sweep_1").unwrap();
        assert_eq!(deal.outcome, RunOutcome::Pass);
        assert_eq!(deal.run_id, "sweep_1");

        let no_deal = parse_run_summary(r#"{"dealReached":false}"#, "sweep_2").unwrap();
        assert_eq!(no_deal.outcome, RunOutcome::NoDeal);

        let bare = parse_run_summary("{}", "sweep_3").unwrap();
        assert_eq!(bare.outcome, RunOutcome::NoDeal);
    }

    #[test]
    fn metrics_and_nulls() {
        let summary = parse_run_summary(
            r#"{"result":"no_deal","finalPrice":null,
                "metrics":{"tFirstDmSec":12.5,"offerCount":3},
                "violations":["BUDGET_EXCEEDED:250>200"]}"#,
            "sweep_4",
        )
        .unwrap();
        assert_eq!(summary.final_price, None);
        assert_eq!(summary.t_first_dm_sec, Some(12.5));
        assert_eq!(summary.offer_count, 3);
        assert_eq!(summary.violations, vec!["BUDGET_EXCEEDED:250>200"]);
    }

    #[test]
    fn null_fields_fall_back() {
        let summary = parse_run_summary(
            r#"{"runId":null,"result":"fail","dealReached":null,"finalPrice":null,
                "metrics":null,"violations":null}"#,
            "sweep_8",
        )
        .unwrap();
        assert_eq!(summary.run_id, "sweep_8");
        assert_eq!(summary.outcome, RunOutcome::Fail);
        assert!(!summary.deal_reached);
        assert_eq!(summary.t_first_dm_sec, None);
        assert_eq!(summary.offer_count, 0);
        assert!(summary.violations.is_empty());

        let derived = parse_run_summary(
            r#"{"result":null,"dealReached":true,"metrics":{"tFirstDmSec":null,"offerCount":null}}"#,
            "sweep_9",
        )
        .unwrap();
        assert_eq!(derived.outcome, RunOutcome::Pass);
        assert_eq!(derived.offer_count, 0);
    }

    #[test]
    fn unknown_result_is_malformed() {
        assert!(parse_run_summary(r#"{"result":"maybe"}"#, "sweep_5").is_err());
        assert!(parse_run_summary("not json", "sweep_6").is_err());
    }
}
