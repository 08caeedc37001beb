//! A single gateway socket session
//!
//! Replaced, never reused, when the manager reconnects.

use crate::error::GatewayError;
use crate::protocol::GatewayMessage;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

/// Instruction for the writer task, which owns the socket sink
#[derive(Debug)]
pub enum Outbound {
    Frame(GatewayMessage),
    /// Send a close frame with this code and stop writing; requested through
    /// [`Connection::close`], outside the frame queue
    Close(u16),
}

/// One physical gateway connection
pub struct Connection {
    /// Monotonic id, distinguishes successive connections in logs
    generation: u64,

    /// Channel to the writer task
    outbound: mpsc::Sender<Outbound>,

    /// Last dispatch sequence received; 0 means none yet
    sequence: AtomicU64,

    /// Session id from READY, or the one being resumed
    session_id: Mutex<Option<String>>,

    heartbeat_interval: Duration,
    last_heartbeat_sent: Mutex<Option<Instant>>,
    last_heartbeat_ack: Mutex<Option<Instant>>,

    /// Set when a heartbeat is sent, cleared by its ACK
    ack_pending: AtomicBool,

    /// READY or RESUMED received on this connection
    established: AtomicBool,

    /// First close code requested; bypasses the frame queue so a full queue
    /// cannot swallow it
    close_code: Mutex<Option<u16>>,
    close_requested: Notify,
}

impl Connection {
    #[must_use]
    pub fn new(
        generation: u64,
        outbound: mpsc::Sender<Outbound>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            generation,
            outbound,
            sequence: AtomicU64::new(0),
            session_id: Mutex::new(None),
            heartbeat_interval,
            last_heartbeat_sent: Mutex::new(None),
            last_heartbeat_ack: Mutex::new(None),
            ack_pending: AtomicBool::new(false),
            established: AtomicBool::new(false),
            close_code: Mutex::new(None),
            close_requested: Notify::new(),
        }
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Last dispatch sequence received, if any
    pub fn sequence(&self) -> Option<u64> {
        match self.sequence.load(Ordering::Acquire) {
            0 => None,
            s => Some(s),
        }
    }

    /// Record a dispatch sequence; the stored value never moves backwards
    pub fn record_sequence(&self, sequence: u64) {
        self.sequence.fetch_max(sequence, Ordering::AcqRel);
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.lock() = Some(session_id.into());
    }

    /// Record that a heartbeat went out and an ACK is now expected
    pub fn mark_heartbeat_sent(&self) {
        *self.last_heartbeat_sent.lock() = Some(Instant::now());
        self.ack_pending.store(true, Ordering::Release);
    }

    /// Record a heartbeat ACK
    pub fn ack_heartbeat(&self) {
        *self.last_heartbeat_ack.lock() = Some(Instant::now());
        self.ack_pending.store(false, Ordering::Release);
    }

    /// Whether the last heartbeat is still unacknowledged
    pub fn is_ack_pending(&self) -> bool {
        self.ack_pending.load(Ordering::Acquire)
    }

    /// Round trip of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        let sent = (*self.last_heartbeat_sent.lock())?;
        let acked = (*self.last_heartbeat_ack.lock())?;
        acked.checked_duration_since(sent)
    }

    pub fn mark_established(&self) {
        self.established.store(true, Ordering::Release);
    }

    /// Whether READY or RESUMED was received on this connection
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    /// Queue a frame for the writer
    pub async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        self.outbound
            .send(Outbound::Frame(message))
            .await
            .map_err(|_| GatewayError::NotConnected)
    }

    /// Ask the writer to close the socket with `code`; the first request wins
    pub fn close(&self, code: u16) {
        self.close_code.lock().get_or_insert(code);
        self.close_requested.notify_one();
    }

    /// Resolves with the close code once [`close`](Self::close) was called
    pub async fn closed(&self) -> u16 {
        loop {
            if let Some(code) = *self.close_code.lock() {
                return code;
            }
            self.close_requested.notified().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("generation", &self.generation)
            .field("sequence", &self.sequence())
            .field("established", &self.is_established())
            .field("heartbeat_interval", &self.heartbeat_interval)
            .finish()
    }
}
