use thiserror::Error;

/// Errors returned by [`crate::MatrixClient`].
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Invalid homeserver URL: {0}")]
    InvalidHomeserver(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The homeserver answered with a non-2xx status.
    #[error("Homeserver returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed homeserver response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl MatrixError {
    /// True for failures worth retrying on the next cycle: transport errors
    /// and 5xx/429 responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidHomeserver(_) | Self::Decode(_) => false,
        }
    }
}
