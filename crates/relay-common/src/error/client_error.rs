//! Client error types
//!
//! Every fallible operation of the runtime converges on [`ClientError`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Runtime-wide error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // Raised synchronously from constructors and `open`
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Gateway errors
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    // REST errors
    #[error("Throttled after {retries} retries")]
    Throttled { retries: u32 },

    #[error("Remote API error {status}: {body}")]
    RemoteApi { status: u16, body: ApiErrorBody },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session closed")]
    Closed,
}

impl ClientError {
    /// Stable machine-readable error code
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Handshake(_) => "HANDSHAKE_ERROR",
            Self::ConnectionLost { .. } => "CONNECTION_LOST",
            Self::Throttled { .. } => "THROTTLED",
            Self::RemoteApi { .. } => "REMOTE_API_ERROR",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Closed => "CLOSED",
        }
    }

    /// Whether retrying the same operation later may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Throttled { .. } | Self::Transport(_) | Self::ConnectionLost { .. } => true,
            Self::RemoteApi { status, .. } => *status >= 500,
            Self::Configuration(_) | Self::Handshake(_) | Self::Decode(_) | Self::Closed => false,
        }
    }

    /// HTTP status for remote API errors
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a decode error
    #[must_use]
    pub fn decode(msg: impl fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<relay_core::TokenError> for ClientError {
    fn from(err: relay_core::TokenError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<relay_core::ShardError> for ClientError {
    fn from(err: relay_core::ShardError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Error payload returned by the remote API on non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Service-specific JSON error code (0 when absent)
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub message: String,
    /// Field-level validation details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ApiErrorBody {
    /// Parse a response body, keeping the raw text when it is not the JSON error shape
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_else(|_| Self {
            code: 0,
            message: String::from_utf8_lossy(bytes).into_owned(),
            errors: None,
        })
    }
}

impl fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
