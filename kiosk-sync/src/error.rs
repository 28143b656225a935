use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Event connection lost or refused. Healed by reconnecting.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// Snapshot endpoint unreachable or answered with a non-success status.
    #[error("snapshot fetch failed: {0}")]
    Fetch(String),

    /// Clear-history request failed; local state is left untouched.
    #[error("command failed: {0}")]
    Command(String),

    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport(error.to_string())
    }
}
