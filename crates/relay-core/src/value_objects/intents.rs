//! Gateway intents bitflags
//!
//! Intents select which event categories the server pushes over the gateway.

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Capability bitmask sent in Identify
    ///
    /// Serialized as a plain integer, as the gateway expects.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        /// Guild create/update/delete, role and channel events
        const GUILDS                        = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS                 = 1 << 1;
        /// Bans and audit log entries
        const GUILD_MODERATION              = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EXPRESSIONS             = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS            = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS                = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES                 = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES            = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES               = 1 << 8;
        /// Guild message create/update/delete
        const GUILD_MESSAGES                = 1 << 9;
        /// Guild message reactions
        const GUILD_MESSAGE_REACTIONS       = 1 << 10;
        /// Guild typing start
        const GUILD_MESSAGE_TYPING          = 1 << 11;
        /// Direct message create/update/delete
        const DIRECT_MESSAGES               = 1 << 12;
        /// Direct message reactions
        const DIRECT_MESSAGE_REACTIONS      = 1 << 13;
        /// Direct message typing start
        const DIRECT_MESSAGE_TYPING         = 1 << 14;
        /// Message content in message events (privileged)
        const MESSAGE_CONTENT               = 1 << 15;
        /// Scheduled event create/update/delete and user add/remove
        const GUILD_SCHEDULED_EVENTS        = 1 << 16;
        /// Auto moderation rule changes
        const AUTO_MODERATION_CONFIGURATION = 1 << 20;
        /// Auto moderation actions
        const AUTO_MODERATION_EXECUTION     = 1 << 21;

        /// Intents that must be enabled for the application before use
        const PRIVILEGED = Self::GUILD_MEMBERS.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::MESSAGE_CONTENT.bits();

        /// Every intent
        const ALL = Self::GUILDS.bits()
            | Self::GUILD_MEMBERS.bits()
            | Self::GUILD_MODERATION.bits()
            | Self::GUILD_EXPRESSIONS.bits()
            | Self::GUILD_INTEGRATIONS.bits()
            | Self::GUILD_WEBHOOKS.bits()
            | Self::GUILD_INVITES.bits()
            | Self::GUILD_VOICE_STATES.bits()
            | Self::GUILD_PRESENCES.bits()
            | Self::GUILD_MESSAGES.bits()
            | Self::GUILD_MESSAGE_REACTIONS.bits()
            | Self::GUILD_MESSAGE_TYPING.bits()
            | Self::DIRECT_MESSAGES.bits()
            | Self::DIRECT_MESSAGE_REACTIONS.bits()
            | Self::DIRECT_MESSAGE_TYPING.bits()
            | Self::MESSAGE_CONTENT.bits()
            | Self::GUILD_SCHEDULED_EVENTS.bits()
            | Self::AUTO_MODERATION_CONFIGURATION.bits()
            | Self::AUTO_MODERATION_EXECUTION.bits();

        /// Every intent that does not need approval
        const ALL_WITHOUT_PRIVILEGED = Self::ALL.bits() & !Self::PRIVILEGED.bits();
    }
}

impl Intents {
    /// Check if any privileged intent is requested
    #[inline]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Parse from string representation (decimal number)
    pub fn parse(s: &str) -> Result<Self, std::num::ParseIntError> {
        s.trim().parse::<u64>().map(Intents::from_bits_truncate)
    }
}

impl Default for Intents {
    fn default() -> Self {
        Intents::ALL_WITHOUT_PRIVILEGED
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u64::deserialize(deserializer)?;
        Ok(Intents::from_bits_truncate(bits))
    }
}

impl From<u64> for Intents {
    fn from(bits: u64) -> Self {
        Intents::from_bits_truncate(bits)
    }
}

impl From<Intents> for u64 {
    fn from(intents: Intents) -> Self {
        intents.bits()
    }
}
