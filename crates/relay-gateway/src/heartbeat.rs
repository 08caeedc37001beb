//! Heartbeat monitor
//!
//! Sends a heartbeat every interval announced in Hello. The first beat is
//! delayed by a random fraction of the interval so that many clients
//! reconnecting together do not beat in lockstep. A beat that finds the
//! previous one still unacknowledged declares the connection zombied.

use crate::connection::Connection;
use crate::protocol::GatewayMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// The previous heartbeat was never acknowledged
    Zombied,
    /// Cancelled, or the writer is gone
    Stopped,
}

pub struct HeartbeatMonitor {
    connection: Arc<Connection>,
    cancel: CancellationToken,
    initial_jitter: Option<f64>,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(connection: Arc<Connection>, cancel: CancellationToken) -> Self {
        Self {
            connection,
            cancel,
            initial_jitter: None,
        }
    }

    /// Fix the first-beat fraction instead of drawing it from `[0, 1)`
    #[must_use]
    pub fn with_initial_jitter(mut self, jitter: f64) -> Self {
        self.initial_jitter = Some(jitter.clamp(0.0, 1.0));
        self
    }

    pub async fn run(self) -> HeartbeatOutcome {
        let interval = self.connection.heartbeat_interval();
        let jitter = self.initial_jitter.unwrap_or_else(rand::random::<f64>);

        if !self.pause(interval.mul_f64(jitter)).await {
            return HeartbeatOutcome::Stopped;
        }

        loop {
            if self.connection.is_ack_pending() {
                tracing::warn!(
                    generation = self.connection.generation(),
                    interval_ms = interval.as_millis() as u64,
                    "Heartbeat not acknowledged, connection zombied"
                );
                return HeartbeatOutcome::Zombied;
            }

            // Marked before queueing so a fast ACK cannot be overwritten
            let sequence = self.connection.sequence();
            self.connection.mark_heartbeat_sent();
            if self
                .connection
                .send(GatewayMessage::heartbeat(sequence))
                .await
                .is_err()
            {
                return HeartbeatOutcome::Stopped;
            }
            tracing::trace!(sequence = ?sequence, "Heartbeat sent");

            if !self.pause(interval).await {
                return HeartbeatOutcome::Stopped;
            }
        }
    }

    /// Sleep unless cancelled first; returns false on cancel
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }
}
