//! Value objects - immutable types that represent protocol concepts

mod intents;
mod session_limit;
mod shard;
mod snowflake;
mod token;

pub use intents::Intents;
pub use session_limit::SessionStartLimit;
pub use shard::{ShardError, ShardInfo};
pub use snowflake::{Snowflake, SnowflakeParseError};
pub use token::{Token, TokenError};
