//! Gateway error types

use relay_common::ClientError;

use crate::protocol::{is_fatal_close, CloseCode};

/// Errors raised by the gateway connection
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Socket error: {0}")]
    Transport(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Server closed the connection with code {code}: {reason}")]
    ServerClose { code: u16, reason: String },

    #[error("Invalid frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Session invalidated (resumable: {resumable})")]
    InvalidSession { resumable: bool },

    #[error("Server requested a reconnect")]
    ReconnectRequested,

    #[error("Heartbeat was not acknowledged")]
    Zombied,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connection lost after {attempts} reconnect attempts")]
    ConnectionLost { attempts: u32 },

    #[error("Gateway is already open")]
    AlreadyOpen,

    #[error("Gateway is not connected")]
    NotConnected,

    #[error("Gateway closed")]
    Closed,
}

impl GatewayError {
    /// Whether the session must end instead of reconnecting
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ServerClose { code, .. } => is_fatal_close(*code),
            _ => false,
        }
    }

    /// Whether the stored session id and sequence must be discarded
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::InvalidSession { resumable } => !resumable,
            Self::ServerClose { code, .. } => {
                CloseCode::from_u16(*code).is_some_and(CloseCode::invalidates_session)
            }
            _ => false,
        }
    }

    /// Close code sent by the server, if any
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ServerClose { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<GatewayError> for ClientError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::AlreadyOpen => Self::Configuration("already open".to_string()),
            GatewayError::Configuration(msg) => Self::Configuration(msg),
            GatewayError::Decode(e) => Self::Decode(e.to_string()),
            GatewayError::Transport(msg) => Self::Transport(msg),
            GatewayError::ConnectionLost { attempts } => Self::ConnectionLost { attempts },
            GatewayError::NotConnected | GatewayError::Closed => Self::Closed,
            GatewayError::Handshake(msg) => Self::Handshake(msg),
            other => Self::Handshake(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let auth = GatewayError::ServerClose {
            code: 4004,
            reason: "Authentication failed".to_string(),
        };
        assert!(auth.is_fatal());
        assert_eq!(auth.close_code(), Some(4004));

        let unknown = GatewayError::ServerClose {
            code: 4000,
            reason: String::new(),
        };
        assert!(!unknown.is_fatal());
        assert!(!GatewayError::Zombied.is_fatal());
    }

    #[test]
    fn test_invalidates_session() {
        assert!(GatewayError::InvalidSession { resumable: false }.invalidates_session());
        assert!(!GatewayError::InvalidSession { resumable: true }.invalidates_session());
        assert!(GatewayError::ServerClose {
            code: 4009,
            reason: String::new()
        }
        .invalidates_session());
        assert!(!GatewayError::ReconnectRequested.invalidates_session());
    }

    #[test]
    fn test_client_error_conversion() {
        let err: ClientError = GatewayError::AlreadyOpen.into();
        assert!(matches!(err, ClientError::Configuration(ref m) if m == "already open"));

        let err: ClientError = GatewayError::ConnectionLost { attempts: 3 }.into();
        assert!(matches!(err, ClientError::ConnectionLost { attempts: 3 }));

        let err: ClientError = GatewayError::ServerClose {
            code: 4004,
            reason: "bad token".to_string(),
        }
        .into();
        assert!(matches!(err, ClientError::Handshake(_)));
    }
}
