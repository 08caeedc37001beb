//! # relay-core
//!
//! Value objects shared by the gateway, REST and session crates.
//! This crate has no dependencies on networking or async runtimes.

pub mod value_objects;

// Re-export commonly used types at crate root
pub use value_objects::{
    Intents, SessionStartLimit, ShardError, ShardInfo, Snowflake, SnowflakeParseError, Token,
    TokenError,
};
