//! Session-start limiter
//!
//! The server allows a fixed number of Identify calls per day and, within a
//! concurrency bucket, at most one every five seconds.

use crate::error::GatewayError;
use relay_core::SessionStartLimit;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Minimum spacing between two identifies in the same bucket
pub const IDENTIFY_SPACING: Duration = Duration::from_secs(5);

/// Window after which the daily allowance refills when the server did not say
const DEFAULT_RESET_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct LimiterState {
    total: u32,
    remaining: u32,
    reset_at: Instant,
    last_identify: Option<Instant>,
}

/// Gates Identify frames for one session
#[derive(Debug)]
pub struct IdentifyLimiter {
    state: Mutex<LimiterState>,
}

impl IdentifyLimiter {
    /// Limiter seeded from the server's limit, or unlimited when unknown
    #[must_use]
    pub fn new(limit: Option<SessionStartLimit>) -> Self {
        let now = Instant::now();
        let state = match limit {
            Some(limit) => LimiterState {
                total: limit.total,
                remaining: limit.remaining,
                reset_at: now + limit.reset_after(),
                last_identify: None,
            },
            None => LimiterState {
                total: u32::MAX,
                remaining: u32::MAX,
                reset_at: now + DEFAULT_RESET_WINDOW,
                last_identify: None,
            },
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Replace the allowance with fresh numbers from the server
    pub async fn update(&self, limit: SessionStartLimit) {
        let mut state = self.state.lock().await;
        state.total = limit.total;
        state.remaining = limit.remaining;
        state.reset_at = Instant::now() + limit.reset_after();
    }

    /// Identifies left before the next reset
    pub async fn remaining(&self) -> u32 {
        self.state.lock().await.remaining
    }

    /// Wait until an Identify may be sent, then consume one unit
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        loop {
            let now = Instant::now();

            if state.remaining == 0 {
                if now >= state.reset_at {
                    state.remaining = state.total;
                    state.reset_at = now + DEFAULT_RESET_WINDOW;
                } else {
                    tracing::warn!(
                        wait_ms = (state.reset_at - now).as_millis() as u64,
                        "Session start limit exhausted, waiting for reset"
                    );
                    let deadline = state.reset_at;
                    wait_until(deadline, cancel).await?;
                    continue;
                }
            }

            if let Some(last) = state.last_identify {
                let next = last + IDENTIFY_SPACING;
                if now < next {
                    tracing::debug!(
                        wait_ms = (next - now).as_millis() as u64,
                        "Spacing identify"
                    );
                    wait_until(next, cancel).await?;
                    continue;
                }
            }

            state.remaining = state.remaining.saturating_sub(1);
            state.last_identify = Some(now);
            return Ok(());
        }
    }
}

async fn wait_until(deadline: Instant, cancel: &CancellationToken) -> Result<(), GatewayError> {
    tokio::select! {
        () = cancel.cancelled() => Err(GatewayError::Closed),
        () = tokio::time::sleep_until(deadline) => Ok(()),
    }
}
