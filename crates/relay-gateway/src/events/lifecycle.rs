//! Lifecycle events raised by the runtime itself
//!
//! They travel through the same registry as server dispatches, under names
//! the server never uses.

use serde::{Deserialize, Serialize};

use super::GatewayEvent;

/// A handshake completed and the session is ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connect {
    /// True when an earlier session was resumed rather than a new one identified
    pub resumed: bool,
}

impl GatewayEvent for Connect {
    const NAME: &'static str = "__CONNECT__";
}

/// An established connection ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disconnect {
    pub reason: String,
    #[serde(default)]
    pub close_code: Option<u16>,
    /// False when the session is now closed for good
    pub will_reconnect: bool,
}

impl GatewayEvent for Disconnect {
    const NAME: &'static str = "__DISCONNECT__";
}

/// A REST call was throttled by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Bucket the throttled route belongs to
    pub bucket: String,
    /// Method and path of the throttled call
    pub route: String,
    pub retry_after_ms: u64,
    pub global: bool,
}

impl GatewayEvent for RateLimit {
    const NAME: &'static str = "__RATE_LIMIT__";
}
