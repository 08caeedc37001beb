//! Socket transport
//!
//! The manager opens sockets through a [`GatewayConnector`], so callers can
//! route the gateway through a proxy or a custom TLS setup.

use crate::error::GatewayError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens gateway sockets
#[async_trait]
pub trait GatewayConnector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<WsStream, GatewayError>;
}

/// Direct connection with a handshake timeout
#[derive(Debug, Clone)]
pub struct DefaultConnector {
    handshake_timeout: Duration,
}

impl DefaultConnector {
    pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(45);

    #[must_use]
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }
}

impl Default for DefaultConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

#[async_trait]
impl GatewayConnector for DefaultConnector {
    async fn connect(&self, url: &str) -> Result<WsStream, GatewayError> {
        let (stream, response) = tokio::time::timeout(self.handshake_timeout, connect_async(url))
            .await
            .map_err(|_| GatewayError::Timeout("socket handshake"))??;

        tracing::debug!(url = %url, status = %response.status(), "Gateway socket opened");
        Ok(stream)
    }
}

/// Append the protocol version and encoding unless the URL already has a query
#[must_use]
pub fn gateway_url(base: &str, version: u8) -> String {
    if base.contains('?') {
        base.to_string()
    } else {
        format!("{}/?v={version}&encoding=json", base.trim_end_matches('/'))
    }
}
