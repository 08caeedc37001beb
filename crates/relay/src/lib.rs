//! # relay
//!
//! Client runtime for a real-time gateway and its rate-limited REST API.
//!
//! A [`Session`] keeps the gateway connection alive across drops (heartbeat,
//! resume, re-identify), hands received events to typed and wildcard
//! subscribers, and funnels REST calls through per-bucket and global limits.

pub mod builder;
pub mod session;

pub use builder::SessionBuilder;
pub use session::Session;

pub use relay_common::{ClientConfig, ClientError, ClientResult, LogLevel};
pub use relay_core::{Intents, SessionStartLimit, ShardInfo, Snowflake, Token};
pub use relay_gateway::events;
pub use relay_gateway::protocol::{
    Activity, IdentifyProperties, PresenceStatus, RequestMembersPayload, StatusUpdatePayload,
};
pub use relay_gateway::{
    ConnectionState, DefaultConnector, Envelope, GatewayConnector, GatewayEvent, HandlerToken,
};
pub use relay_rest::{GatewayBot, Method, RestResponse, Route};
