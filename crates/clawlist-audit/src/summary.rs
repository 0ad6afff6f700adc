//! Aggregation and reporting over a recorded audit log.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::{AuditEntry, AuditEventType};
use crate::error::AuditError;

/// Number of constraint violations listed in full by the report.
const CRITICAL_LISTING_LIMIT: usize = 5;

/// Counts derived from a single audit log, or from several merged together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    /// Number of successfully parsed entries.
    pub total_events: usize,
    pub offers_made: usize,
    pub offers_accepted: usize,
    pub offers_rejected: usize,
    pub constraint_violations: usize,
    pub injection_attempts: usize,
    /// Violation prefix (e.g. `BUDGET_EXCEEDED`) to occurrence count, taken
    /// from `CONSTRAINT_VIOLATION` entries only.
    pub violation_types: BTreeMap<String, usize>,
    /// The `CONSTRAINT_VIOLATION` entries themselves, in file order.
    #[serde(skip)]
    pub critical_violations: Vec<AuditEntry>,
}

/// Tolerant view of one log line. Only `eventType` is required; any other
/// field may be missing or `null`, so entries written by older or foreign
/// writers still count.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoggedLine {
    event_type: AuditEventType,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    agent_profile: Option<String>,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    constraints: Option<serde_json::Value>,
    #[serde(default)]
    violations: Option<Vec<String>>,
    #[serde(default)]
    suspicious_content: Option<Vec<String>>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl From<LoggedLine> for AuditEntry {
    fn from(line: LoggedLine) -> Self {
        Self {
            timestamp: line.timestamp.unwrap_or_default(),
            agent_profile: line.agent_profile.unwrap_or_default(),
            run_id: line.run_id,
            event_type: line.event_type,
            decision: line
                .decision
                .unwrap_or_else(|| line.event_type.as_str().to_string()),
            reasoning: line.reasoning,
            constraints: line.constraints,
            violations: line.violations,
            suspicious_content: line.suspicious_content,
            metadata: line.metadata,
        }
    }
}

/// Parses one non-blank log line, filling absent fields with empty values.
fn parse_line(line: &str) -> Option<AuditEntry> {
    serde_json::from_str::<LoggedLine>(line).ok().map(AuditEntry::from)
}

impl AuditSummary {
    /// Builds a summary from JSONL text.
    ///
    /// A line counts when it is a JSON object with a known `eventType`;
    /// every other field is optional. Blank and unparseable lines are
    /// skipped and do not count towards `total_events`.
    pub fn from_jsonl(content: &str) -> Self {
        let mut summary = Self::default();
        let mut skipped = 0usize;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some(entry) => summary.add(entry),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "skipped malformed audit log lines");
        }
        summary
    }

    /// Folds one entry into the counts.
    pub fn add(&mut self, entry: AuditEntry) {
        self.total_events += 1;
        match entry.event_type {
            AuditEventType::OfferMade => self.offers_made += 1,
            AuditEventType::OfferAccepted => self.offers_accepted += 1,
            AuditEventType::OfferRejected => self.offers_rejected += 1,
            AuditEventType::InjectionDetected => self.injection_attempts += 1,
            AuditEventType::ConstraintViolation => {
                self.constraint_violations += 1;
                for kind in entry.violation_kinds() {
                    *self.violation_types.entry(kind.to_string()).or_insert(0) += 1;
                }
                self.critical_violations.push(entry);
            }
        }
    }

    /// Adds the counts of `other` into `self`.
    pub fn merge(&mut self, other: AuditSummary) {
        self.total_events += other.total_events;
        self.offers_made += other.offers_made;
        self.offers_accepted += other.offers_accepted;
        self.offers_rejected += other.offers_rejected;
        self.constraint_violations += other.constraint_violations;
        self.injection_attempts += other.injection_attempts;
        for (kind, count) in other.violation_types {
            *self.violation_types.entry(kind).or_insert(0) += count;
        }
        self.critical_violations.extend(other.critical_violations);
    }

    /// Share of parsed entries that were constraint violations, in percent.
    pub fn violation_rate(&self) -> f64 {
        if self.total_events == 0 {
            0.0
        } else {
            self.constraint_violations as f64 / self.total_events as f64 * 100.0
        }
    }

    /// Renders the audit report as markdown.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut out);
        out
    }

    fn write_markdown(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "# Audit Summary")?;
        writeln!(out)?;
        writeln!(out, "**Total Events:** {}", self.total_events)?;
        writeln!(out)?;
        writeln!(out, "## Decisions")?;
        writeln!(out, "- Offers Made: {}", self.offers_made)?;
        writeln!(out, "- Offers Accepted: {}", self.offers_accepted)?;
        writeln!(out, "- Offers Rejected: {}", self.offers_rejected)?;
        writeln!(out)?;
        writeln!(out, "## Security")?;
        writeln!(out, "- Constraint Violations: {}", self.constraint_violations)?;
        writeln!(out, "- Injection Attempts: {}", self.injection_attempts)?;

        if !self.violation_types.is_empty() {
            writeln!(out)?;
            writeln!(out, "### Violation Types")?;
            let mut kinds: Vec<(&String, &usize)> = self.violation_types.iter().collect();
            // Most frequent first; ties stay alphabetical.
            kinds.sort_by(|a, b| b.1.cmp(a.1));
            for (kind, count) in kinds {
                writeln!(out, "- {kind}: {count}")?;
            }
        }

        writeln!(out)?;
        writeln!(out, "## Assessment")?;
        writeln!(
            out,
            "- Violation Rate: {:.1}% ({}/{})",
            self.violation_rate(),
            self.constraint_violations,
            self.total_events
        )?;
        if self.injection_attempts > 0 {
            writeln!(
                out,
                "- WARNING: {} prompt injection attempts detected",
                self.injection_attempts
            )?;
            if self.constraint_violations == 0 {
                writeln!(out, "- All injection attempts blocked by constraints")?;
            }
        }

        if !self.critical_violations.is_empty() {
            writeln!(out)?;
            writeln!(out, "## Critical Violations")?;
            for entry in self.critical_violations.iter().take(CRITICAL_LISTING_LIMIT) {
                writeln!(out)?;
                writeln!(out, "**{}**", entry.decision)?;
                if let Some(reasoning) = &entry.reasoning {
                    writeln!(out, "- Reasoning: {reasoning}")?;
                }
                if let Some(violations) = &entry.violations {
                    writeln!(out, "- Violations: {}", violations.join(", "))?;
                }
                if !entry.timestamp.is_empty() {
                    writeln!(out, "- Timestamp: {}", entry.timestamp)?;
                }
            }
            if self.critical_violations.len() > CRITICAL_LISTING_LIMIT {
                writeln!(out)?;
                writeln!(
                    out,
                    "... and {} more",
                    self.critical_violations.len() - CRITICAL_LISTING_LIMIT
                )?;
            }
        }
        Ok(())
    }
}

/// Reads and summarizes the audit log at `path`.
///
/// # Errors
///
/// Returns `AuditError::Io` if the file cannot be read, including when it
/// does not exist. Malformed lines are not errors.
pub fn summarize(path: impl AsRef<Path>) -> Result<AuditSummary, AuditError> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(AuditSummary::from_jsonl(&content))
}

/// Reads every parseable entry from the audit log at `path`, in file order.
///
/// Fields missing from a line come back empty, as in [`AuditSummary::from_jsonl`].
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<AuditEntry>, AuditError> {
    let content = fs::read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect())
}
