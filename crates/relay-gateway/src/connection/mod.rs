//! Gateway connection building blocks

mod backoff;
mod connection;
mod connector;
mod identify_limiter;
mod resume;
mod state;

pub use backoff::Backoff;
pub use connection::{Connection, Outbound};
pub use connector::{gateway_url, DefaultConnector, GatewayConnector, WsStream};
pub use identify_limiter::{IdentifyLimiter, IDENTIFY_SPACING};
pub use resume::ResumeState;
pub use state::ConnectionState;

pub use relay_core::SessionStartLimit;
