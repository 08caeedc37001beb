//! # relay-gateway
//!
//! Gateway client: connection lifecycle, heartbeat, resume and event dispatch.

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod manager;
pub mod protocol;

pub use connection::{ConnectionState, DefaultConnector, GatewayConnector, SessionStartLimit};
pub use dispatch::{EventRegistry, HandlerToken};
pub use error::GatewayError;
pub use events::{Envelope, GatewayEvent};
pub use manager::{GatewayConfig, GatewayManager};
