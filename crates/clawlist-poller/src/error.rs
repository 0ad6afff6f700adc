//! Error types for the poller.

use clawlist_matrix::MatrixError;
use thiserror::Error;

/// Failures reading or writing the persisted poller state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures delivering a trigger to a buyer agent. Never retried.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn dispatch command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("dispatch command timed out after {0} seconds")]
    Timeout(u64),

    #[error("dispatch command exited with {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
}

/// Failures of a single poll cycle. The loop logs these and retries on the
/// next interval. State persistence errors are logged inside the cycle and
/// never surface here.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("sync failed: {0}")]
    Sync(#[from] MatrixError),
}
