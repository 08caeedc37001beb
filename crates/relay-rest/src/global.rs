//! Global request limiter
//!
//! Two gates shared by every route: a steady requests-per-second quota, and
//! a hard stop set when the server answers 429 with the global flag.

use crate::error::RestError;
use crate::headers::deadline;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 50;

pub struct GlobalLimiter {
    quota: DefaultDirectRateLimiter,
    blocked_until: Mutex<Option<Instant>>,
}

impl GlobalLimiter {
    #[must_use]
    pub fn new(requests_per_second: u32) -> Self {
        let per_second = NonZeroU32::new(requests_per_second)
            .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND))
            .unwrap_or(NonZeroU32::MIN);
        Self {
            quota: RateLimiter::direct(Quota::per_second(per_second)),
            blocked_until: Mutex::new(None),
        }
    }

    /// Stop every route for `duration`
    pub fn block_for(&self, duration: Duration) {
        let until = deadline(duration);
        let mut blocked = self.blocked_until.lock();
        if blocked.map_or(true, |current| current < until) {
            *blocked = Some(until);
        }
    }

    pub fn blocked_for(&self) -> Option<Duration> {
        let until = (*self.blocked_until.lock())?;
        let left = until.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    /// Wait for both gates
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RestError> {
        while let Some(wait) = self.blocked_for() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Globally rate limited");
            tokio::select! {
                () = cancel.cancelled() => return Err(RestError::Closed),
                () = tokio::time::sleep(wait) => {}
            }
        }

        tokio::select! {
            () = cancel.cancelled() => Err(RestError::Closed),
            () = self.quota.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for GlobalLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalLimiter")
            .field("blocked_for", &self.blocked_for())
            .finish()
    }
}

impl Default for GlobalLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_SECOND)
    }
}
