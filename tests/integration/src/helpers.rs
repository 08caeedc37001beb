//! Simulated servers
//!
//! [`MockGateway`] accepts socket connections and hands each one to the test
//! as a [`GatewayPeer`] that the test scripts frame by frame. [`MockRest`]
//! serves an axum router on a loopback port.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use relay_gateway::protocol::{GatewayMessage, OpCode};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// How long a test waits for any single expected frame
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(15);

/// Gateway server that hands every accepted connection to the test
pub struct MockGateway {
    pub addr: SocketAddr,
    peers: mpsc::UnboundedReceiver<GatewayPeer>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, peers) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                if tx.send(GatewayPeer { socket }).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            addr,
            peers,
            _handle: handle,
        })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Wait for the client's next connection
    pub async fn accept(&mut self) -> Result<GatewayPeer> {
        tokio::time::timeout(FRAME_TIMEOUT, self.peers.recv())
            .await
            .context("no client connected")?
            .ok_or_else(|| anyhow!("gateway listener stopped"))
    }
}

/// Server side of one client connection
pub struct GatewayPeer {
    socket: WebSocketStream<TcpStream>,
}

impl GatewayPeer {
    pub async fn send(&mut self, message: GatewayMessage) -> Result<()> {
        self.socket.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    pub async fn hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(GatewayMessage::hello(heartbeat_interval_ms)).await
    }

    pub async fn dispatch(&mut self, name: &str, seq: u64, data: Value) -> Result<()> {
        self.send(GatewayMessage::dispatch(name, seq, data)).await
    }

    /// Next frame from the client, heartbeats included
    pub async fn recv_any(&mut self) -> Result<GatewayMessage> {
        tokio::time::timeout(FRAME_TIMEOUT, self.read_frame())
            .await
            .context("timed out waiting for a client frame")?
    }

    async fn read_frame(&mut self) -> Result<GatewayMessage> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => return Ok(GatewayMessage::from_json(&text)?),
                Message::Close(frame) => bail!("client closed the socket: {frame:?}"),
                _ => {}
            }
        }
        bail!("client disconnected")
    }

    /// Next non-heartbeat frame; heartbeats are acknowledged on the way
    pub async fn recv(&mut self) -> Result<GatewayMessage> {
        loop {
            let message = self.recv_any().await?;
            if message.op == OpCode::Heartbeat {
                self.send(GatewayMessage::heartbeat_ack()).await?;
                continue;
            }
            return Ok(message);
        }
    }

    /// Next frame, which must carry `op`
    pub async fn expect(&mut self, op: OpCode) -> Result<GatewayMessage> {
        let message = self.recv().await?;
        if message.op != op {
            bail!("expected {op}, got {message}");
        }
        Ok(message)
    }

    /// Wait until the client closes the socket and return the close code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        tokio::time::timeout(FRAME_TIMEOUT, self.read_close())
            .await
            .context("client did not close")
    }

    async fn read_close(&mut self) -> Option<u16> {
        while let Some(frame) = self.socket.next().await {
            match frame {
                Ok(Message::Close(frame)) => return frame.map(|f| u16::from(f.code)),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }

    /// Close from the server side with `code`
    pub async fn close(mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.socket.close(Some(frame)).await?;
        Ok(())
    }

    /// Drop the TCP connection without a close frame
    pub fn drop_connection(self) {
        drop(self.socket);
    }
}

/// REST server over an axum router
pub struct MockRest {
    pub addr: SocketAddr,
    _handle: JoinHandle<()>,
}

impl MockRest {
    pub async fn start(router: axum::Router) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        Ok(Self {
            addr,
            _handle: handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Poll `condition` until it holds or `FRAME_TIMEOUT` passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + FRAME_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            bail!("condition not reached in time");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
