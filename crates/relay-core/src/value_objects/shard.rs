//! Shard coordinates
//!
//! A bot may split its guilds across several gateway connections. Each
//! connection identifies with `[shard_id, shard_count]`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::Snowflake;

/// Shard index and total shard count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardInfo {
    id: u32,
    count: u32,
}

/// Invalid shard coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShardError {
    #[error("shard count must be at least 1")]
    ZeroCount,

    #[error("shard id {id} is out of range for shard count {count}")]
    OutOfRange { id: u32, count: u32 },
}

impl ShardInfo {
    /// Validate and build shard coordinates
    pub fn new(id: u32, count: u32) -> Result<Self, ShardError> {
        if count == 0 {
            return Err(ShardError::ZeroCount);
        }
        if id >= count {
            return Err(ShardError::OutOfRange { id, count });
        }
        Ok(Self { id, count })
    }

    /// Single-shard configuration `[0, 1]`
    #[must_use]
    pub const fn single() -> Self {
        Self { id: 0, count: 1 }
    }

    /// Shard index
    #[inline]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Total number of shards
    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Shard that receives events for a given guild
    #[inline]
    pub fn shard_for_guild(guild_id: Snowflake, count: u32) -> u32 {
        if count == 0 {
            return 0;
        }
        ((guild_id.into_inner() >> 22) % u64::from(count)) as u32
    }

    /// Check whether this shard receives events for a guild
    #[inline]
    pub fn handles_guild(&self, guild_id: Snowflake) -> bool {
        Self::shard_for_guild(guild_id, self.count) == self.id
    }

    /// Identify rate-limit bucket for this shard given `max_concurrency`
    #[inline]
    pub fn rate_limit_key(&self, max_concurrency: u32) -> u32 {
        self.id % max_concurrency.max(1)
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.id, self.count)
    }
}

// Serialized as a two-element array, as Identify expects
impl Serialize for ShardInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.id, self.count].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShardInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [id, count] = <[u32; 2]>::deserialize(deserializer)?;
        ShardInfo::new(id, count).map_err(serde::de::Error::custom)
    }
}
