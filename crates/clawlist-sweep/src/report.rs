//! Markdown and CSV renderers for [`SweepStats`].

use std::fmt::Write as _;

use crate::stats::Distribution;
use crate::SweepStats;

/// Renders the sweep report as markdown. Sections with no data are left
/// out.
pub fn format_report(stats: &SweepStats) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(stats, &mut out);
    out
}

fn fixed(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

fn write_report(stats: &SweepStats, out: &mut String) -> std::fmt::Result {
    writeln!(out, "# Sweep Statistics")?;
    writeln!(out)?;
    writeln!(out, "## Overview")?;
    writeln!(out, "- Total runs: {}", stats.total_runs)?;
    writeln!(
        out,
        "- Successful: {} ({:.1}%)",
        stats.successful,
        stats.success_rate * 100.0
    )?;
    writeln!(out, "- Failed: {}", stats.failed)?;
    writeln!(out, "- No deal: {}", stats.no_deal)?;
    writeln!(out)?;

    if !stats.prices.is_empty() {
        writeln!(out, "## Final Prices (€)")?;
        write_center_and_spread(out, &stats.prices)?;
        writeln!(
            out,
            "- Range: {} - {}",
            display(stats.prices.min),
            display(stats.prices.max)
        )?;
        writeln!(out)?;
    }

    if !stats.response_time.is_empty() {
        let times = &stats.response_time;
        writeln!(out, "## Response Time (seconds)")?;
        write_center_and_spread(out, times)?;
        writeln!(out, "- 95th percentile: {}", fixed(times.p95))?;
        writeln!(out, "- 99th percentile: {}", fixed(times.p99))?;
        writeln!(out, "- Range: {} - {}", fixed(times.min), fixed(times.max))?;
        writeln!(out)?;
    }

    if !stats.offers.is_empty() {
        writeln!(out, "## Offer Count")?;
        writeln!(out, "- Mean: {}", fixed(stats.offers.mean))?;
        writeln!(out, "- Median: {}", fixed(stats.offers.median))?;
        writeln!(out)?;
    }

    if !stats.violations.is_empty() {
        writeln!(out, "## Violations")?;
        let mut codes: Vec<(&String, &usize)> = stats.violations.iter().collect();
        codes.sort_by(|a, b| b.1.cmp(a.1));
        for (code, count) in codes {
            writeln!(out, "- {code}: {count}")?;
        }
        writeln!(out)?;
    }

    if let Some(audit) = &stats.audit {
        writeln!(out, "## Audit")?;
        writeln!(out, "- Audited runs: {}", stats.audited_runs)?;
        writeln!(out, "- Events: {}", audit.total_events)?;
        writeln!(out, "- Constraint violations: {}", audit.constraint_violations)?;
        writeln!(out, "- Injection attempts: {}", audit.injection_attempts)?;
        writeln!(out, "- Violation rate: {:.1}%", audit.violation_rate())?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_center_and_spread(out: &mut String, d: &Distribution) -> std::fmt::Result {
    writeln!(out, "- Mean: {}", fixed(d.mean))?;
    writeln!(out, "- Median: {}", fixed(d.median))?;
    writeln!(out, "- Std Dev: {}", fixed(d.std_dev))
}

fn display(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

/// Exports per-index values as CSV.
///
/// Row `i` holds the `i`-th price, response time, and offer count of their
/// respective lists; the lists are independent, so a row may mix runs and
/// cells past the end of a shorter list are blank.
pub fn export_csv(stats: &SweepStats) -> String {
    let columns = [
        &stats.prices.values,
        &stats.response_time.values,
        &stats.offers.values,
    ];
    let rows = columns.iter().map(|c| c.len()).max().unwrap_or(0);

    let mut lines = vec!["run_index,final_price,response_time_sec,offer_count".to_string()];
    for i in 0..rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| display(column.get(i).copied()))
            .collect();
        lines.push(format!("{},{}", i + 1, cells.join(",")));
    }
    lines.join("\n")
}
