//! Gateway events
//!
//! The dispatch envelope, the typed-event trait and the built-in events.

mod envelope;
mod lifecycle;
mod payloads;

pub(crate) use envelope::{decode_raw, Payload};
pub use envelope::{Envelope, GatewayEvent};
pub use lifecycle::{Connect, Disconnect, RateLimit};
pub use payloads::{
    GuildCreate, GuildDelete, GuildMembersChunk, MessageCreate, MessageDelete, Ready, Resumed,
    UnavailableGuild, User,
};
