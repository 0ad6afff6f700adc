//! Offline statistics over a sweep of simulation runs.
//!
//! A sweep is a directory of independent runs. This crate reads each run's
//! summary (and audit log, when present), aggregates outcomes, prices,
//! response times, offer counts and violations, and renders the result as
//! markdown or CSV. Nothing here is authoritative: the per-run files are,
//! and the statistics are recomputed on every invocation.

mod error;
pub mod report;
pub mod run;
pub mod stats;

use std::collections::BTreeMap;
use std::path::Path;

use clawlist_audit::AuditSummary;
use clawlist_types::RunOutcome;

pub use error::SweepError;
pub use report::{export_csv, format_report};
pub use run::{discover_runs, load_run_summary, parse_run_summary, RunSummary};
pub use stats::Distribution;

/// Aggregate view of a sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepStats {
    pub total_runs: usize,
    pub successful: usize,
    pub failed: usize,
    pub no_deal: usize,
    /// `successful / total_runs`, 0 for an empty sweep.
    pub success_rate: f64,
    /// Final prices of successful runs that recorded one.
    pub prices: Distribution,
    /// Positive first-DM latencies of all runs.
    pub response_time: Distribution,
    /// Positive offer counts of all runs.
    pub offers: Distribution,
    /// Full violation code to number of occurrences.
    pub violations: BTreeMap<String, usize>,
    /// Merged audit summaries of runs that had an audit log.
    pub audit: Option<AuditSummary>,
    pub audited_runs: usize,
}

impl SweepStats {
    /// Aggregates already-loaded run summaries, in the order given.
    pub fn from_runs(runs: &[RunSummary]) -> Self {
        let count = |outcome: RunOutcome| runs.iter().filter(|r| r.outcome == outcome).count();
        let successful = count(RunOutcome::Pass);

        let prices = runs
            .iter()
            .filter(|r| r.outcome == RunOutcome::Pass)
            .filter_map(|r| r.final_price)
            .collect();
        let times = runs
            .iter()
            .filter_map(|r| r.t_first_dm_sec)
            .filter(|t| *t > 0.0)
            .collect();
        let offers = runs
            .iter()
            .map(|r| r.offer_count)
            .filter(|n| *n > 0)
            .map(f64::from)
            .collect();

        let mut violations = BTreeMap::new();
        for code in runs.iter().flat_map(|r| &r.violations) {
            *violations.entry(code.clone()).or_insert(0) += 1;
        }

        let mut audit: Option<AuditSummary> = None;
        let mut audited_runs = 0;
        for run_audit in runs.iter().filter_map(|r| r.audit.clone()) {
            audited_runs += 1;
            audit.get_or_insert_with(AuditSummary::default).merge(run_audit);
        }

        Self {
            total_runs: runs.len(),
            successful,
            failed: count(RunOutcome::Fail),
            no_deal: count(RunOutcome::NoDeal),
            success_rate: if runs.is_empty() {
                0.0
            } else {
                successful as f64 / runs.len() as f64
            },
            prices: Distribution::from_values(prices),
            response_time: Distribution::from_values(times),
            offers: Distribution::from_values(offers),
            violations,
            audit,
            audited_runs,
        }
    }
}

/// Discovers, loads, and aggregates every run under `sweep_dir`.
///
/// Runs without a readable `out/summary.json` are skipped.
///
/// # Errors
///
/// Returns `SweepError::Io` if `sweep_dir` cannot be listed.
pub fn analyze_sweep(sweep_dir: impl AsRef<Path>) -> Result<SweepStats, SweepError> {
    let sweep_dir = sweep_dir.as_ref();
    let run_dirs = discover_runs(sweep_dir)?;
    let runs: Vec<RunSummary> = run_dirs
        .iter()
        .filter_map(|dir| load_run_summary(dir))
        .collect();

    tracing::info!(
        sweep = %sweep_dir.display(),
        discovered = run_dirs.len(),
        loaded = runs.len(),
        "analyzed sweep"
    );
    Ok(SweepStats::from_runs(&runs))
}
