//! Append-only audit trail for marketplace agent decisions.
//!
//! Every constraint decision (offer sent, acceptance committed, price
//! blocked) and every detected injection attempt is recorded as one JSON
//! line. The log is the after-the-fact evidence that no agent crossed its
//! owner's bounds, whatever the counterparty wrote.
//!
//! # Event types
//!
//! | Type | Written by |
//! |------|-----------|
//! | `OFFER_MADE` | [`AuditLog::log_buyer_offer`] when the offer passed |
//! | `OFFER_ACCEPTED` | [`AuditLog::log_seller_acceptance`] when the price passed |
//! | `OFFER_REJECTED` | [`AuditLog::log_offer_rejected`] |
//! | `CONSTRAINT_VIOLATION` | either offer wrapper when the validator blocked |
//! | `INJECTION_DETECTED` | [`AuditLog::log_injection_attempt`] |
//!
//! # Usage
//!
//! ```rust,ignore
//! use clawlist_audit::{summarize, AuditLog};
//!
//! let audit = AuditLog::for_run("runs/sweep_1").with_run_id("sweep_1");
//! audit.log_buyer_offer("buyer", 150.0, true, "within budget", &constraints, &[])?;
//!
//! let summary = summarize(audit.path())?;
//! println!("{}", summary.render_markdown());
//! ```

mod entry;
mod error;
mod log;
mod summary;

pub use entry::{AuditEntry, AuditEventType, ParseAuditEventTypeError};
pub use error::AuditError;
pub use log::{audit_path_for_run, AuditLog};
pub use summary::{read_entries, summarize, AuditSummary};

#[cfg(test)]
mod tests;
