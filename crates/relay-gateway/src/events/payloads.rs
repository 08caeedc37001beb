//! Built-in dispatch events
//!
//! Only the events the runtime itself relies on, plus a few common ones.
//! Anything else reaches wildcard subscribers as a raw [`Envelope`](super::Envelope)
//! or can be declared by implementing [`GatewayEvent`].

use relay_core::{ShardInfo, Snowflake};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::GatewayEvent;

// === Connection Events ===

/// READY, sent after a successful Identify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    #[serde(default)]
    pub v: u8,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    /// URL to use when resuming this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardInfo>,
}

impl GatewayEvent for Ready {
    const NAME: &'static str = "READY";
}

/// RESUMED, sent after a successful Resume
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resumed {}

impl GatewayEvent for Resumed {
    const NAME: &'static str = "RESUMED";
}

/// Guild listed in READY before its GUILD_CREATE arrives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

/// User data included in events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

// === Guild Events ===

/// GUILD_CREATE
///
/// Only the identifying fields are typed; the full object stays in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildCreate {
    pub id: Snowflake,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unavailable: Option<bool>,
    #[serde(default)]
    pub member_count: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl GatewayEvent for GuildCreate {
    const NAME: &'static str = "GUILD_CREATE";
}

/// GUILD_DELETE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildDelete {
    pub id: Snowflake,
    /// True for an outage, false when the bot left or was removed
    #[serde(default)]
    pub unavailable: bool,
}

impl GatewayEvent for GuildDelete {
    const NAME: &'static str = "GUILD_DELETE";
}

/// GUILD_MEMBERS_CHUNK, the answer to a members request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildMembersChunk {
    pub guild_id: Snowflake,
    #[serde(default)]
    pub members: Vec<Value>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    #[serde(default)]
    pub not_found: Vec<Snowflake>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl GatewayEvent for GuildMembersChunk {
    const NAME: &'static str = "GUILD_MEMBERS_CHUNK";
}

// === Message Events ===

/// MESSAGE_CREATE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl GatewayEvent for MessageCreate {
    const NAME: &'static str = "MESSAGE_CREATE";
}

/// MESSAGE_DELETE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

impl GatewayEvent for MessageDelete {
    const NAME: &'static str = "MESSAGE_DELETE";
}
