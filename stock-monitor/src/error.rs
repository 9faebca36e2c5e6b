use std::io;
use thiserror::Error;

/// Reasons a single-symbol quote fetch produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status: {0}")]
    Status(u16),

    #[error("payload sentinel not found in response body")]
    SentinelMissing,

    #[error("failed to decode quote payload: {0}")]
    Decode(String),

    #[error("quote payload contained no records")]
    EmptyPayload,
}

impl FetchFailure {
    /// Failures caused by the network rather than by the response content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchFailure::Transport(_) | FetchFailure::Timeout | FetchFailure::Status(_)
        )
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// A record could not be turned into a display row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Invalid data received: missing field `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}
