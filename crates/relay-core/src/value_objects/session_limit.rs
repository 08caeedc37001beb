//! Session-start allowance reported by `GET /gateway/bot`

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How many new sessions may still be identified, and how fast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets to `total`
    pub reset_after: u64,
    /// Identifies allowed in parallel, one per rate-limit key
    pub max_concurrency: u32,
}

impl SessionStartLimit {
    #[must_use]
    pub fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_after)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
