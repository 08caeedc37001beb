//! Connection lifecycle manager
//!
//! One supervisor task per open session runs the reconnect loop. Each
//! connection it establishes runs a read loop, a writer task and a heartbeat
//! monitor, all cancelled through a child of the session's cancellation token.

use crate::connection::{
    gateway_url, Backoff, Connection, ConnectionState, GatewayConnector, IdentifyLimiter,
    Outbound, ResumeState, SessionStartLimit, WsStream,
};
use crate::dispatch::EventRegistry;
use crate::error::GatewayError;
use crate::events::{Connect, Disconnect, Envelope};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatOutcome};
use crate::protocol::{
    GatewayMessage, IdentifyPayload, IdentifyProperties, OpCode, RequestMembersPayload,
    ResumePayload, StatusUpdatePayload, GATEWAY_VERSION,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use relay_common::ClientConfig;
use relay_core::{Intents, ShardInfo, Token};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Channel buffer size for outgoing frames
const OUTBOUND_BUFFER: usize = 64;

/// How long shutdown waits for tasks to flush
const CLOSE_GRACE: Duration = Duration::from_secs(2);

const CLEAN_CLOSE: u16 = 1000;

/// Closing with anything but 1000/1001 keeps the session resumable server-side
const RESUMABLE_CLOSE: u16 = 4000;

/// Gateway connection settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub token: Token,
    pub intents: Intents,
    pub shard: ShardInfo,
    /// Gateway URL; must be set before `open`
    pub url: Option<String>,
    pub properties: IdentifyProperties,
    pub large_threshold: u32,
    /// Presence sent with Identify
    pub presence: Option<StatusUpdatePayload>,
    /// Bound on the Hello wait and on the wait for READY/RESUMED
    pub handshake_timeout: Duration,
    /// Failed attempts tolerated before the first handshake gives up
    pub handshake_attempts: u32,
    /// Failed reconnects tolerated after a drop; unlimited when `None`
    pub max_reconnect_attempts: Option<u32>,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(token: Token) -> Self {
        Self {
            token,
            intents: Intents::default(),
            shard: ShardInfo::single(),
            url: None,
            properties: IdentifyProperties::default(),
            large_threshold: 250,
            presence: None,
            handshake_timeout: Duration::from_secs(45),
            handshake_attempts: 3,
            max_reconnect_attempts: None,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
        }
    }

    #[must_use]
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            intents: config.intents,
            shard: config.shard,
            url: config.gateway_url.clone(),
            properties: IdentifyProperties::default(),
            large_threshold: config.gateway.large_threshold,
            presence: None,
            handshake_timeout: config.gateway.handshake_timeout(),
            handshake_attempts: config.gateway.handshake_attempts.max(1),
            max_reconnect_attempts: config.gateway.max_reconnect_attempts,
            backoff_base: config.gateway.backoff_base(),
            backoff_max: config.gateway.backoff_max(),
        }
    }

    fn identify_frame(&self) -> Result<GatewayMessage, serde_json::Error> {
        GatewayMessage::identify(&IdentifyPayload {
            token: self.token.as_str().to_string(),
            intents: self.intents,
            shard: self.shard,
            properties: self.properties.clone(),
            compress: false,
            large_threshold: self.large_threshold,
            presence: self.presence.clone(),
        })
    }
}

/// Drives the gateway connection of one session
#[derive(Clone)]
pub struct GatewayManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: GatewayConfig,
    url: RwLock<Option<String>>,
    connector: Arc<dyn GatewayConnector>,
    registry: EventRegistry,
    limiter: IdentifyLimiter,
    state: watch::Sender<ConnectionState>,
    resume: Mutex<ResumeState>,
    connection: RwLock<Option<Arc<Connection>>>,
    /// Completes the pending `open` call on the first READY/RESUMED or on failure
    open_waiter: Mutex<Option<oneshot::Sender<Result<(), GatewayError>>>>,
    lifecycle: tokio::sync::Mutex<Option<Running>>,
    generation: AtomicU64,
}

struct Running {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl GatewayManager {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn GatewayConnector>,
        registry: EventRegistry,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ManagerInner {
                url: RwLock::new(config.url.clone()),
                config,
                connector,
                registry,
                limiter: IdentifyLimiter::new(None),
                state,
                resume: Mutex::new(ResumeState::default()),
                connection: RwLock::new(None),
                open_waiter: Mutex::new(None),
                lifecycle: tokio::sync::Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Gateway URL used for new sessions
    pub fn gateway_url(&self) -> Option<String> {
        self.inner.url.read().clone()
    }

    pub fn set_gateway_url(&self, url: impl Into<String>) {
        *self.inner.url.write() = Some(url.into());
    }

    /// Seed the identify limiter with the server's session-start limit
    pub async fn update_session_start_limit(&self, limit: SessionStartLimit) {
        self.inner.limiter.update(limit).await;
    }

    /// Connect and wait for the first READY or RESUMED
    pub async fn open(&self) -> Result<(), GatewayError> {
        let url = self
            .gateway_url()
            .ok_or_else(|| GatewayError::Configuration("no gateway URL configured".to_string()))?;

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            if lifecycle
                .as_ref()
                .is_some_and(|running| !running.supervisor.is_finished())
            {
                return Err(GatewayError::AlreadyOpen);
            }

            *self.inner.open_waiter.lock() = Some(ready_tx);
            let cancel = CancellationToken::new();
            let supervisor = Supervisor::new(self.inner.clone(), cancel.clone(), url);
            *lifecycle = Some(Running {
                cancel,
                supervisor: tokio::spawn(supervisor.run()),
            });
        }

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                // The supervisor is exiting; reap it so a retry is not refused
                let running = self.inner.lifecycle.lock().await.take();
                if let Some(running) = running {
                    let _ = tokio::time::timeout(CLOSE_GRACE, running.supervisor).await;
                }
                Err(err)
            }
            Err(_) => Err(GatewayError::Closed),
        }
    }

    /// Close the session cleanly and forget it; idempotent
    pub async fn close(&self) {
        let running = self.inner.lifecycle.lock().await.take();
        if let Some(running) = running {
            if let Some(connection) = self.inner.connection.write().take() {
                connection.close(CLEAN_CLOSE);
            }
            running.cancel.cancel();
            self.inner.notify_open(Err(GatewayError::Closed));

            if tokio::time::timeout(CLOSE_GRACE, running.supervisor)
                .await
                .is_err()
            {
                tracing::warn!("Gateway supervisor did not stop in time");
            }
            tracing::info!(shard = %self.inner.config.shard, "Gateway closed");
        }

        self.inner.resume.lock().clear();
        self.inner.set_state(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn heartbeat_latency(&self) -> Option<Duration> {
        self.inner.connection.read().as_ref()?.latency()
    }

    /// Snapshot of the stored session id, sequence and resume URL
    pub fn resume_state(&self) -> ResumeState {
        self.inner.resume.lock().clone()
    }

    /// Send a frame over the live connection
    pub async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotConnected);
        }
        let connection = self
            .inner
            .connection
            .read()
            .clone()
            .ok_or(GatewayError::NotConnected)?;
        connection.send(message).await
    }

    /// Update the client's presence (op 3)
    pub async fn update_status(&self, status: &StatusUpdatePayload) -> Result<(), GatewayError> {
        self.send(GatewayMessage::status_update(status)?).await
    }

    /// Request guild members (op 8); answers arrive as GUILD_MEMBERS_CHUNK
    pub async fn request_members(
        &self,
        request: &RequestMembersPayload,
    ) -> Result<(), GatewayError> {
        self.send(GatewayMessage::request_members(request)?).await
    }
}

impl std::fmt::Debug for GatewayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayManager")
            .field("shard", &self.inner.config.shard)
            .field("state", &self.state())
            .finish()
    }
}

impl ManagerInner {
    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "Gateway state changed");
        }
    }

    fn notify_open(&self, result: Result<(), GatewayError>) {
        if let Some(waiter) = self.open_waiter.lock().take() {
            let _ = waiter.send(result);
        }
    }

    fn on_ready(&self, connection: &Connection, raw: &Value) {
        match SessionInfo::deserialize(raw) {
            Ok(info) => {
                connection.set_session_id(info.session_id.clone());
                let mut resume = self.resume.lock();
                resume.session_id = Some(info.session_id);
                resume.resume_url = info.resume_gateway_url;
                if let Some(sequence) = connection.sequence() {
                    resume.record_sequence(sequence);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "READY carried no usable session id, resume disabled");
            }
        }
        self.on_established(connection, false);
    }

    fn on_established(&self, connection: &Connection, resumed: bool) {
        connection.mark_established();
        self.set_state(ConnectionState::Connected);
        tracing::info!(
            shard = %self.config.shard,
            generation = connection.generation(),
            resumed,
            "Gateway session ready"
        );
        self.notify_open(Ok(()));
    }
}

/// Fields of READY the manager needs for resuming
#[derive(Deserialize)]
struct SessionInfo {
    session_id: String,
    #[serde(default)]
    resume_gateway_url: Option<String>,
}

/// How a single connection ended
enum ConnectionEnd {
    Cancelled {
        established: bool,
    },
    Dropped {
        error: GatewayError,
        established: bool,
        resuming: bool,
    },
}

/// Reconnect loop for one open session
struct Supervisor {
    inner: Arc<ManagerInner>,
    cancel: CancellationToken,
    url: String,
    backoff: Backoff,
    /// Consecutive connections that ended before READY/RESUMED
    failures: u32,
    /// A handshake has succeeded at least once
    opened: bool,
}

impl Supervisor {
    fn new(inner: Arc<ManagerInner>, cancel: CancellationToken, url: String) -> Self {
        let backoff = Backoff::new(inner.config.backoff_base, inner.config.backoff_max);
        Self {
            inner,
            cancel,
            url,
            backoff,
            failures: 0,
            opened: false,
        }
    }

    async fn run(mut self) {
        loop {
            match self.run_connection().await {
                ConnectionEnd::Cancelled { established } => {
                    if established {
                        self.inner.registry.emit(Disconnect {
                            reason: "session closed".to_string(),
                            close_code: Some(CLEAN_CLOSE),
                            will_reconnect: false,
                        });
                    }
                    break;
                }
                ConnectionEnd::Dropped {
                    error,
                    established,
                    resuming,
                } => {
                    let resume_refused = resuming
                        && !established
                        && !matches!(error, GatewayError::InvalidSession { resumable: true });
                    if error.invalidates_session() || resume_refused {
                        tracing::debug!("Discarding session, next handshake identifies");
                        self.inner.resume.lock().clear();
                    }

                    if established {
                        self.opened = true;
                        self.failures = 0;
                        self.backoff.reset();
                    } else {
                        self.failures += 1;
                    }

                    if let Some(terminal) = self.terminal_error(&error) {
                        tracing::error!(
                            shard = %self.inner.config.shard,
                            error = %error,
                            "Gateway session ended"
                        );
                        if self.opened {
                            self.inner.registry.emit(Disconnect {
                                reason: terminal.to_string(),
                                close_code: error.close_code(),
                                will_reconnect: false,
                            });
                        }
                        self.inner.notify_open(Err(terminal));
                        break;
                    }

                    if established {
                        self.inner.registry.emit(Disconnect {
                            reason: error.to_string(),
                            close_code: error.close_code(),
                            will_reconnect: true,
                        });
                    }
                    self.inner.set_state(ConnectionState::Reconnecting);

                    let delay = if matches!(error, GatewayError::InvalidSession { resumable: false })
                    {
                        Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000))
                    } else {
                        self.backoff.next_delay()
                    };
                    tracing::info!(
                        shard = %self.inner.config.shard,
                        error = %error,
                        failures = self.failures,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to gateway"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.inner.connection.write().take();
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Error that ends the session, if this drop is not worth retrying
    fn terminal_error(&self, error: &GatewayError) -> Option<GatewayError> {
        let config = &self.inner.config;

        if error.is_fatal() {
            return Some(GatewayError::Handshake(error.to_string()));
        }
        if !self.opened && self.failures >= config.handshake_attempts {
            return Some(GatewayError::Handshake(format!(
                "gave up after {} attempts: {error}",
                self.failures
            )));
        }
        if self.opened
            && config
                .max_reconnect_attempts
                .is_some_and(|max| self.failures >= max)
        {
            return Some(GatewayError::ConnectionLost {
                attempts: self.failures,
            });
        }
        None
    }

    async fn run_connection(&mut self) -> ConnectionEnd {
        let inner = self.inner.clone();
        let resume = inner.resume.lock().clone();
        let resuming = resume.can_resume();

        let dropped = |error: GatewayError| ConnectionEnd::Dropped {
            error,
            established: false,
            resuming,
        };

        inner.set_state(ConnectionState::Connecting);
        let base = match (&resume.resume_url, resuming) {
            (Some(resume_url), true) => resume_url.as_str(),
            _ => self.url.as_str(),
        };
        let url = gateway_url(base, GATEWAY_VERSION);

        let socket = tokio::select! {
            () = self.cancel.cancelled() => return ConnectionEnd::Cancelled { established: false },
            result = inner.connector.connect(&url) => match result {
                Ok(socket) => socket,
                Err(error) => return dropped(error),
            },
        };
        let (sink, mut stream) = socket.split();

        inner.set_state(ConnectionState::AwaitingHello);
        let hello = tokio::time::timeout(inner.config.handshake_timeout, await_hello(&mut stream));
        let interval = tokio::select! {
            () = self.cancel.cancelled() => return ConnectionEnd::Cancelled { established: false },
            result = hello => match result {
                Ok(Ok(interval)) => interval,
                Ok(Err(error)) => return dropped(error),
                Err(_) => return dropped(GatewayError::Timeout("Hello")),
            },
        };

        // Only Identify counts against the session-start limit
        if !resuming && inner.limiter.acquire(&self.cancel).await.is_err() {
            return ConnectionEnd::Cancelled { established: false };
        }

        let generation = inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let connection = Arc::new(Connection::new(generation, outbound, interval));
        let conn_cancel = self.cancel.child_token();
        let writer = tokio::spawn(run_writer(
            sink,
            outbound_rx,
            connection.clone(),
            conn_cancel.clone(),
        ));

        let handshake = if resuming {
            inner.set_state(ConnectionState::Resuming);
            let session_id = resume.session_id.clone().unwrap_or_default();
            let seq = resume.sequence.unwrap_or_default();
            connection.set_session_id(session_id.clone());
            connection.record_sequence(seq);
            tracing::info!(generation, session_id = %session_id, seq, "Resuming gateway session");
            GatewayMessage::resume(&ResumePayload {
                token: inner.config.token.as_str().to_string(),
                session_id,
                seq,
            })
        } else {
            inner.set_state(ConnectionState::Identifying);
            tracing::info!(generation, shard = %inner.config.shard, "Identifying");
            inner.config.identify_frame()
        };
        let sent = match handshake {
            Ok(frame) => connection.send(frame).await,
            Err(e) => Err(GatewayError::Decode(e)),
        };
        if let Err(error) = sent {
            conn_cancel.cancel();
            return dropped(error);
        }

        *inner.connection.write() = Some(connection.clone());

        let heartbeat = HeartbeatMonitor::new(connection.clone(), conn_cancel.clone()).run();
        let reader = read_loop(inner.clone(), connection.clone(), stream);
        let deadline = handshake_deadline(connection.clone(), inner.config.handshake_timeout);

        let ended = tokio::select! {
            () = self.cancel.cancelled() => None,
            error = reader => Some(error),
            outcome = heartbeat => Some(match outcome {
                HeartbeatOutcome::Zombied => GatewayError::Zombied,
                HeartbeatOutcome::Stopped => GatewayError::Transport("writer stopped".to_string()),
            }),
            () = deadline => Some(GatewayError::Timeout("READY")),
        };

        let established = connection.is_established();
        {
            let mut current = inner.connection.write();
            if current
                .as_ref()
                .is_some_and(|c| c.generation() == generation)
            {
                *current = None;
            }
        }

        match ended {
            Some(error) if !self.cancel.is_cancelled() => {
                tracing::warn!(generation, error = %error, "Gateway connection ended");
                connection.close(RESUMABLE_CLOSE);
                conn_cancel.cancel();
                let _ = tokio::time::timeout(CLOSE_GRACE, writer).await;
                ConnectionEnd::Dropped {
                    error,
                    established,
                    resuming,
                }
            }
            _ => {
                conn_cancel.cancel();
                let _ = tokio::time::timeout(CLOSE_GRACE, writer).await;
                ConnectionEnd::Cancelled { established }
            }
        }
    }
}

/// Wait for Hello and return the heartbeat interval
async fn await_hello(stream: &mut SplitStream<WsStream>) -> Result<Duration, GatewayError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                let message = GatewayMessage::from_json(&text)?;
                if let Some(hello) = message.as_hello() {
                    if hello.heartbeat_interval == 0 {
                        return Err(GatewayError::Protocol(
                            "zero heartbeat interval".to_string(),
                        ));
                    }
                    return Ok(Duration::from_millis(hello.heartbeat_interval));
                }
                tracing::debug!(op = %message.op, "Ignoring frame before Hello");
            }
            Message::Close(frame) => return Err(close_error(frame)),
            _ => {}
        }
    }
    Err(GatewayError::Transport("socket closed before Hello".to_string()))
}

/// Read frames until the connection must end, returning why
async fn read_loop(
    inner: Arc<ManagerInner>,
    connection: Arc<Connection>,
    mut stream: SplitStream<WsStream>,
) -> GatewayError {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => return close_error(frame),
            Ok(Message::Binary(_)) => {
                tracing::debug!("Ignoring binary frame");
                continue;
            }
            Ok(_) => continue,
            Err(e) => return e.into(),
        };

        let message = match GatewayMessage::from_json(&text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    generation = connection.generation(),
                    error = %e,
                    "Skipping undecodable frame"
                );
                continue;
            }
        };

        if let Err(error) = handle_frame(&inner, &connection, message).await {
            return error;
        }
    }
    GatewayError::Transport("socket closed by peer".to_string())
}

async fn handle_frame(
    inner: &ManagerInner,
    connection: &Connection,
    message: GatewayMessage,
) -> Result<(), GatewayError> {
    tracing::trace!(op = %message.op, "Received frame");

    match message.op {
        OpCode::Dispatch => {
            if let Some(sequence) = message.s {
                connection.record_sequence(sequence);
                inner.resume.lock().record_sequence(sequence);
            }
            let Some(name) = message.t else {
                tracing::warn!(seq = ?message.s, "Dispatch without event name");
                return Ok(());
            };
            let raw = message.d.unwrap_or(Value::Null);

            let connected = match name.as_str() {
                "READY" => {
                    inner.on_ready(connection, &raw);
                    Some(false)
                }
                "RESUMED" => {
                    inner.on_established(connection, true);
                    Some(true)
                }
                _ => None,
            };

            inner.registry.dispatch(Envelope::new(name, message.s, raw));
            if let Some(resumed) = connected {
                inner.registry.emit(Connect { resumed });
            }
        }
        OpCode::Heartbeat => {
            connection
                .send(GatewayMessage::heartbeat(connection.sequence()))
                .await?;
        }
        OpCode::HeartbeatAck => {
            connection.ack_heartbeat();
            tracing::trace!(latency = ?connection.latency(), "Heartbeat acknowledged");
        }
        OpCode::Reconnect => return Err(GatewayError::ReconnectRequested),
        OpCode::InvalidSession => {
            let resumable = message.as_invalid_session().unwrap_or(false);
            return Err(GatewayError::InvalidSession { resumable });
        }
        OpCode::Hello => tracing::debug!("Ignoring repeated Hello"),
        other => tracing::debug!(op = %other, "Ignoring unexpected op code"),
    }
    Ok(())
}

/// Owns the socket sink; stops after a close frame, on cancel or on write failure
async fn run_writer(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Outbound>,
    connection: Arc<Connection>,
    cancel: CancellationToken,
) {
    let generation = connection.generation();
    loop {
        // A requested close goes out before any queued frame or cancellation
        let next = tokio::select! {
            biased;
            code = connection.closed() => Some(Outbound::Close(code)),
            next = rx.recv() => next,
            () = cancel.cancelled() => None,
        };

        match next {
            Some(Outbound::Frame(message)) => {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(op = %message.op, error = %e, "Dropping unserializable frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!(generation, error = %e, "Gateway write failed");
                    break;
                }
            }
            Some(Outbound::Close(code)) => {
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(generation, error = %e, "Failed to send close frame");
                }
                break;
            }
            None => break,
        }
    }
    let _ = sink.close().await;
    tracing::debug!(generation, "Gateway writer stopped");
}

/// Resolves if READY/RESUMED has not arrived within `timeout`
async fn handshake_deadline(connection: Arc<Connection>, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    if connection.is_established() {
        std::future::pending::<()>().await;
    }
}

fn close_error(frame: Option<CloseFrame<'_>>) -> GatewayError {
    match frame {
        Some(frame) => GatewayError::ServerClose {
            code: u16::from(frame.code),
            reason: frame.reason.into_owned(),
        },
        None => GatewayError::ServerClose {
            code: 1005,
            reason: String::new(),
        },
    }
}
