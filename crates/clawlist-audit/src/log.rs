//! Append-only writer for the audit trail.
//!
//! All writes go through [`AuditLog::record`], which serialises one entry
//! per line and appends it to the bound file. The file and its parent
//! directories are created lazily on the first write.
//!
//! # Concurrency
//!
//! One `AuditLog` is the single writer for its path within a process;
//! clones of an `Arc<AuditLog>` share its append lock. Several processes
//! appending to the same path is unsupported: each line is written with one
//! `write_all` on an append-mode handle, which usually keeps whole lines
//! intact on local filesystems but is not a guarantee.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clawlist_types::{BuyerConstraints, SellerConstraints};
use serde_json::json;

use crate::entry::{AuditEntry, AuditEventType};
use crate::error::AuditError;

/// Characters of the offending message kept in injection entries.
const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Explicitly constructed audit writer bound to one JSONL file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    run_id: Option<String>,
    append_lock: Mutex<()>,
}

impl AuditLog {
    /// Binds a writer to `path`. Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_id: None,
            append_lock: Mutex::new(()),
        }
    }

    /// Binds a writer to `<run_dir>/out/audit.jsonl`.
    pub fn for_run(run_dir: impl AsRef<Path>) -> Self {
        Self::new(audit_path_for_run(run_dir))
    }

    /// Stamps `run_id` on every entry built by the convenience wrappers.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// The file this writer appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entry` as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Serialization` if the entry cannot be encoded and
    /// `AuditError::Io` if the directory or file cannot be created or written.
    /// Failures are never swallowed: a decision that cannot be audited must
    /// surface to the caller.
    pub fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.append_lock.lock().map_err(|_| AuditError::LockPoisoned)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        tracing::debug!(
            path = %self.path.display(),
            event_type = %entry.event_type,
            agent = %entry.agent_profile,
            "recorded audit entry"
        );
        Ok(())
    }

    fn entry(
        &self,
        agent_profile: &str,
        event_type: AuditEventType,
        decision: String,
    ) -> AuditEntry {
        let mut entry = AuditEntry::now(agent_profile, event_type, decision);
        entry.run_id = self.run_id.clone();
        entry
    }

    /// Records a buyer offer decision.
    ///
    /// An accepted offer is `OFFER_MADE`; a blocked one is
    /// `CONSTRAINT_VIOLATION`. An empty `violations` slice is omitted.
    pub fn log_buyer_offer(
        &self,
        agent_profile: &str,
        offer_price: f64,
        accepted: bool,
        reasoning: &str,
        constraints: &BuyerConstraints,
        violations: &[String],
    ) -> Result<AuditEntry, AuditError> {
        let (event_type, decision) = if accepted {
            (AuditEventType::OfferMade, format!("Offered {offer_price}€"))
        } else {
            (
                AuditEventType::ConstraintViolation,
                format!("Rejected offer of {offer_price}€"),
            )
        };
        let mut entry = self.entry(agent_profile, event_type, decision);
        entry.reasoning = Some(reasoning.to_string());
        entry.constraints = Some(serde_json::to_value(constraints)?);
        entry.violations = non_empty(violations);
        self.record(&entry)?;
        Ok(entry)
    }

    /// Records a seller acceptance decision.
    ///
    /// An accepted price is `OFFER_ACCEPTED`; a blocked one is
    /// `CONSTRAINT_VIOLATION`.
    pub fn log_seller_acceptance(
        &self,
        agent_profile: &str,
        accepted_price: f64,
        accepted: bool,
        reasoning: &str,
        constraints: &SellerConstraints,
        violations: &[String],
    ) -> Result<AuditEntry, AuditError> {
        let (event_type, decision) = if accepted {
            (
                AuditEventType::OfferAccepted,
                format!("Accepted offer of {accepted_price}€"),
            )
        } else {
            (
                AuditEventType::ConstraintViolation,
                format!("Rejected offer of {accepted_price}€"),
            )
        };
        let mut entry = self.entry(agent_profile, event_type, decision);
        entry.reasoning = Some(reasoning.to_string());
        entry.constraints = Some(serde_json::to_value(constraints)?);
        entry.violations = non_empty(violations);
        self.record(&entry)?;
        Ok(entry)
    }

    /// Records an offer the agent declined while it was within bounds.
    pub fn log_offer_rejected(
        &self,
        agent_profile: &str,
        offer_price: f64,
        reasoning: &str,
    ) -> Result<AuditEntry, AuditError> {
        let mut entry = self.entry(
            agent_profile,
            AuditEventType::OfferRejected,
            format!("Declined offer of {offer_price}€"),
        );
        entry.reasoning = Some(reasoning.to_string());
        self.record(&entry)?;
        Ok(entry)
    }

    /// Records a message flagged by the injection detector.
    pub fn log_injection_attempt(
        &self,
        agent_profile: &str,
        message: &str,
        injection_markers: &[&str],
    ) -> Result<AuditEntry, AuditError> {
        let preview: String = message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
        let mut entry = self.entry(
            agent_profile,
            AuditEventType::InjectionDetected,
            "Message flagged as suspicious".to_string(),
        );
        entry.suspicious_content = Some(injection_markers.iter().map(|m| m.to_string()).collect());
        entry.metadata = Some(json!({
            "messagePreview": preview,
            "markerCount": injection_markers.len(),
        }));
        self.record(&entry)?;
        Ok(entry)
    }
}

/// Conventional audit log location inside a run directory.
pub fn audit_path_for_run(run_dir: impl AsRef<Path>) -> PathBuf {
    run_dir.as_ref().join("out").join("audit.jsonl")
}

fn non_empty(violations: &[String]) -> Option<Vec<String>> {
    if violations.is_empty() {
        None
    } else {
        Some(violations.to_vec())
    }
}
