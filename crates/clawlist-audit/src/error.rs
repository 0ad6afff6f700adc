//! Error types for the audit trail.

/// Errors that can occur while writing or reading an audit log.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Creating, opening, appending to, or reading the log file failed.
    #[error("audit log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be serialised.
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another writer panicked while holding the append lock.
    #[error("audit log writer lock poisoned")]
    LockPoisoned,
}
