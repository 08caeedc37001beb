//! Authentication credential
//!
//! Accepted forms are a raw token, `Bot <token>` and `Bearer <token>`.
//! The token body is restricted to the URL-safe base64 alphabet plus `.`.

use serde::{Serialize, Serializer};
use std::fmt;

const BOT_PREFIX: &str = "Bot ";
const BEARER_PREFIX: &str = "Bearer ";

/// Validated credential string
///
/// The `Debug` impl redacts the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

/// Malformed credential
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("token contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl Token {
    /// Validate a credential string
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim_start();
        let (prefix, body) = if let Some(body) = raw.strip_prefix(BOT_PREFIX) {
            (BOT_PREFIX, body)
        } else if let Some(body) = raw.strip_prefix(BEARER_PREFIX) {
            (BEARER_PREFIX, body)
        } else {
            ("", raw)
        };
        let body = body.trim_end();

        if body.is_empty() {
            return Err(TokenError::Empty);
        }

        if let Some(bad) = body
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(TokenError::InvalidCharacter(bad));
        }

        Ok(Self(format!("{prefix}{body}")))
    }

    /// Value for the `Authorization` header and the Identify payload
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the credential is a bot token
    pub fn is_bot(&self) -> bool {
        self.0.starts_with(BOT_PREFIX)
    }

    /// Whether the credential is an OAuth2 bearer token
    pub fn is_bearer(&self) -> bool {
        self.0.starts_with(BEARER_PREFIX)
    }
}

impl std::str::FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::parse(s)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_bot() {
            "Bot"
        } else if self.is_bearer() {
            "Bearer"
        } else {
            "Raw"
        };
        write!(f, "Token({kind}, <redacted>)")
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}
