use thiserror::Error;

/// Errors that abort a sweep analysis. Individual unreadable runs are
/// skipped instead.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("failed to read sweep directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
