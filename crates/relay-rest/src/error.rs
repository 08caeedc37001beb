//! REST error types

use relay_common::{ApiErrorBody, ClientError};

/// Errors raised by the REST client
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Throttled after {retries} retries")]
    Throttled { retries: u32 },

    #[error("Remote API error {status}: {body}")]
    RemoteApi { status: u16, body: ApiErrorBody },

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("REST client closed")]
    Closed,
}

impl RestError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<RestError> for ClientError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Configuration(msg) => Self::Configuration(msg),
            RestError::Throttled { retries } => Self::Throttled { retries },
            RestError::RemoteApi { status, body } => Self::RemoteApi { status, body },
            RestError::Decode(e) => Self::Decode(e.to_string()),
            RestError::Transport(msg) => Self::Transport(msg),
            RestError::Closed => Self::Closed,
        }
    }
}
