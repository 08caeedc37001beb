//! Connection lifecycle states

use std::fmt;

/// State of the gateway connection lifecycle
///
/// `Disconnected` is terminal until `open` is called again. `Connected` is the
/// only state in which the session is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    Connected,
    /// Connection dropped, waiting out the backoff
    Reconnecting,
}

impl ConnectionState {
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether a handshake is in flight
    #[inline]
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHello | Self::Identifying | Self::Resuming
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
