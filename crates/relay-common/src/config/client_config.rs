//! Client configuration structs
//!
//! Loads configuration from environment variables or builds it in code.

use relay_core::{Intents, ShardError, ShardInfo, Token, TokenError};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Authentication credential
    pub token: Token,
    /// Event categories the gateway should push
    pub intents: Intents,
    /// Shard coordinates for this session
    pub shard: ShardInfo,
    /// Gateway URL override; discovered through `GET /gateway/bot` when unset
    pub gateway_url: Option<String>,
    /// REST API base URL
    pub api_url: String,
    /// Diagnostic verbosity; tracing is left untouched when unset
    pub log_level: Option<LogLevel>,
    /// Number of handler invocations allowed to run at once
    pub dispatch_workers: usize,
    /// Gateway connection settings
    pub gateway: GatewaySettings,
    /// REST client settings
    pub rest: RestSettings,
}

/// Diagnostic verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    #[default]
    Error,
    /// Errors and warnings
    Warning,
    /// Lifecycle information
    Informational,
    /// Everything, including frame traces
    Debug,
}

impl LogLevel {
    /// Parse a level from a name or its numeric form (0-3)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "error" => Some(Self::Error),
            "1" | "warn" | "warning" => Some(Self::Warning),
            "2" | "info" | "informational" => Some(Self::Informational),
            "3" | "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

/// Gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Socket handshake timeout, also used for the Hello wait
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Failed attempts tolerated before `open` gives up
    #[serde(default = "default_handshake_attempts")]
    pub handshake_attempts: u32,
    /// Consecutive reconnect attempts before the session is declared lost
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    /// First reconnect delay
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound on the reconnect delay
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Member count above which offline members are not sent in GUILD_CREATE
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
}

impl GatewaySettings {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: default_handshake_timeout_ms(),
            handshake_attempts: default_handshake_attempts(),
            max_reconnect_attempts: None,
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            large_threshold: default_large_threshold(),
        }
    }
}

/// REST client settings
#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retries for network-level failures
    #[serde(default = "default_max_network_retries")]
    pub max_network_retries: u32,
    /// Retries for throttled (429) responses
    #[serde(default = "default_max_throttle_retries")]
    pub max_throttle_retries: u32,
    /// Global request allowance per second across all routes
    #[serde(default = "default_global_requests_per_second")]
    pub global_requests_per_second: u32,
    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl RestSettings {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_network_retries: default_max_network_retries(),
            max_throttle_retries: default_max_throttle_retries(),
            global_requests_per_second: default_global_requests_per_second(),
            user_agent: default_user_agent(),
        }
    }
}

// Default value functions
fn default_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_dispatch_workers() -> usize {
    32
}

fn default_handshake_timeout_ms() -> u64 {
    45_000
}

fn default_handshake_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    120_000
}

fn default_large_threshold() -> u32 {
    250
}

fn default_request_timeout_ms() -> u64 {
    20_000
}

fn default_max_network_retries() -> u32 {
    3
}

fn default_max_throttle_retries() -> u32 {
    5
}

fn default_global_requests_per_second() -> u32 {
    50
}

fn default_user_agent() -> String {
    format!("relay/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Build a configuration with defaults around a credential
    pub fn new(token: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            token: Token::parse(token)?,
            intents: Intents::default(),
            shard: ShardInfo::single(),
            gateway_url: None,
            api_url: default_api_url(),
            log_level: None,
            dispatch_workers: default_dispatch_workers(),
            gateway: GatewaySettings::default(),
            rest: RestSettings::default(),
        })
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `RELAY_TOKEN` is missing or any value is malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("RELAY_TOKEN").map_err(|_| ConfigError::MissingVar("RELAY_TOKEN"))?;
        let mut config = Self::new(&token)?;

        if let Ok(raw) = env::var("RELAY_INTENTS") {
            config.intents = Intents::parse(&raw)
                .map_err(|e| ConfigError::InvalidValue("RELAY_INTENTS", e.to_string()))?;
        }

        let shard_id = parse_var::<u32>("RELAY_SHARD_ID")?.unwrap_or(0);
        let shard_count = parse_var::<u32>("RELAY_SHARD_COUNT")?.unwrap_or(1);
        config.shard = ShardInfo::new(shard_id, shard_count)?;

        config.gateway_url = env::var("RELAY_GATEWAY_URL").ok();
        config.api_url = env::var("RELAY_API_URL").unwrap_or_else(|_| default_api_url());

        if let Ok(raw) = env::var("RELAY_LOG_LEVEL") {
            config.log_level = Some(
                LogLevel::parse(&raw)
                    .ok_or_else(|| ConfigError::InvalidValue("RELAY_LOG_LEVEL", raw.clone()))?,
            );
        }

        config.dispatch_workers =
            parse_var("RELAY_DISPATCH_WORKERS")?.unwrap_or_else(default_dispatch_workers);

        config.gateway = GatewaySettings {
            handshake_timeout_ms: parse_var("RELAY_HANDSHAKE_TIMEOUT_MS")?
                .unwrap_or_else(default_handshake_timeout_ms),
            handshake_attempts: parse_var("RELAY_HANDSHAKE_ATTEMPTS")?
                .unwrap_or_else(default_handshake_attempts),
            max_reconnect_attempts: parse_var("RELAY_MAX_RECONNECT_ATTEMPTS")?,
            backoff_base_ms: parse_var("RELAY_BACKOFF_BASE_MS")?
                .unwrap_or_else(default_backoff_base_ms),
            backoff_max_ms: parse_var("RELAY_BACKOFF_MAX_MS")?
                .unwrap_or_else(default_backoff_max_ms),
            large_threshold: parse_var("RELAY_LARGE_THRESHOLD")?
                .unwrap_or_else(default_large_threshold),
        };

        config.rest = RestSettings {
            request_timeout_ms: parse_var("RELAY_REQUEST_TIMEOUT_MS")?
                .unwrap_or_else(default_request_timeout_ms),
            max_network_retries: parse_var("RELAY_MAX_NETWORK_RETRIES")?
                .unwrap_or_else(default_max_network_retries),
            max_throttle_retries: parse_var("RELAY_MAX_THROTTLE_RETRIES")?
                .unwrap_or_else(default_max_throttle_retries),
            global_requests_per_second: parse_var("RELAY_GLOBAL_REQUESTS_PER_SECOND")?
                .unwrap_or_else(default_global_requests_per_second),
            user_agent: env::var("RELAY_USER_AGENT").unwrap_or_else(|_| default_user_agent()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_workers == 0 {
            return Err(ConfigError::InvalidValue(
                "dispatch_workers",
                "must be at least 1".to_string(),
            ));
        }
        if self.gateway.handshake_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "handshake_attempts",
                "must be at least 1".to_string(),
            ));
        }
        if self.gateway.backoff_base_ms > self.gateway.backoff_max_ms {
            return Err(ConfigError::InvalidValue(
                "backoff_base_ms",
                "must not exceed backoff_max_ms".to_string(),
            ));
        }
        if self.rest.global_requests_per_second == 0 {
            return Err(ConfigError::InvalidValue(
                "global_requests_per_second",
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid credential: {0}")]
    Token(#[from] TokenError),

    #[error("Invalid shard: {0}")]
    Shard(#[from] ShardError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = ClientConfig::new("Bot abc.def.ghi").unwrap();
        assert!(config.token.is_bot());
        assert_eq!(config.intents, Intents::default());
        assert_eq!(config.shard, ShardInfo::single());
        assert_eq!(config.api_url, "https://discord.com/api/v10");
        assert!(config.gateway_url.is_none());
        assert_eq!(config.gateway.handshake_timeout(), Duration::from_secs(45));
        assert_eq!(config.rest.request_timeout(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_user_agent_names_version() {
        let config = ClientConfig::new("abc").unwrap();
        assert_eq!(
            config.rest.user_agent,
            format!("relay/{}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_new_rejects_bad_token() {
        let err = ClientConfig::new("Bot ").unwrap_err();
        assert!(matches!(err, ConfigError::Token(TokenError::Empty)));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = ClientConfig::new("abc").unwrap();
        config.dispatch_workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("dispatch_workers", _))
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = ClientConfig::new("abc").unwrap();
        config.gateway.backoff_base_ms = 10_000;
        config.gateway.backoff_max_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("0"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Informational));
        assert_eq!(LogLevel::parse("3"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
        assert!(LogLevel::Debug > LogLevel::Warning);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: GatewaySettings =
            serde_json::from_str(r#"{"handshake_attempts": 5}"#).unwrap();
        assert_eq!(settings.handshake_attempts, 5);
        assert_eq!(settings.backoff_base_ms, 1_000);
        assert_eq!(settings.max_reconnect_attempts, None);
    }
}
