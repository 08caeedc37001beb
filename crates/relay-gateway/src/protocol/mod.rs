//! Gateway protocol definitions
//!
//! Op codes, frame format, payloads and close codes.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{is_fatal_close, CloseCode};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceStatus,
    RequestMembersPayload, ResumePayload, StatusUpdatePayload,
};

/// Gateway protocol version requested in the connection URL
pub const GATEWAY_VERSION: u8 = 10;
