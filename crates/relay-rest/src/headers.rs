//! Rate-limit response headers

use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::Instant;

pub const LIMIT: &str = "x-ratelimit-limit";
pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const BUCKET: &str = "x-ratelimit-bucket";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const SCOPE: &str = "x-ratelimit-scope";
pub const RETRY_AFTER: &str = "retry-after";

/// Longest wait any server-supplied duration can impose
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Which limit a 429 hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    User,
    Global,
    /// A per-resource limit shared with other clients
    Shared,
}

impl RateLimitScope {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "global" => Some(Self::Global),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Rate-limit state reported by one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Reset time as fractional Unix seconds
    pub reset: Option<f64>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub global: bool,
    pub scope: Option<RateLimitScope>,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let number = |name: &str| text(name).and_then(|v| v.parse::<f64>().ok());

        Self {
            limit: text(LIMIT).and_then(|v| v.parse().ok()),
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset: number(RESET),
            reset_after: number(RESET_AFTER).and_then(seconds),
            bucket: text(BUCKET).filter(|v| !v.is_empty()).map(str::to_string),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scope: text(SCOPE).and_then(RateLimitScope::parse),
            retry_after: number(RETRY_AFTER).and_then(seconds),
        }
    }

    /// Whether the response described its bucket at all
    pub fn has_bucket_info(&self) -> bool {
        self.remaining.is_some() || self.reset_after.is_some() || self.reset.is_some()
    }

    /// Time until the bucket refills, preferring the relative header
    pub fn reset_in(&self) -> Option<Duration> {
        if let Some(after) = self.reset_after {
            return Some(after);
        }
        let reset = self.reset?;
        let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        seconds((reset - now).max(0.0))
    }
}

/// Body of a 429 response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TooManyRequests {
    #[serde(default)]
    pub message: String,
    /// Seconds
    #[serde(default)]
    pub retry_after: Option<f64>,
    #[serde(default)]
    pub global: bool,
}

impl TooManyRequests {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after.and_then(seconds)
    }
}

/// Non-negative seconds as a duration, capped at [`MAX_WAIT`]
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .map(|duration| duration.min(MAX_WAIT))
}

/// Instant `after` from now, capped at [`MAX_WAIT`]
pub(crate) fn deadline(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after.min(MAX_WAIT)).unwrap_or(now + MAX_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_parse_bucket_headers() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("X-RateLimit-Limit", "5"),
            ("X-RateLimit-Remaining", "4"),
            ("X-RateLimit-Reset", "1470173023.123"),
            ("X-RateLimit-Reset-After", "1.5"),
            ("X-RateLimit-Bucket", "abcd1234"),
        ]));

        assert_eq!(parsed.limit, Some(5));
        assert_eq!(parsed.remaining, Some(4));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd1234"));
        assert!(!parsed.global);
        assert!(parsed.has_bucket_info());
        assert_eq!(parsed.reset_in(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_global_throttle() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("Retry-After", "2"),
            ("X-RateLimit-Global", "true"),
            ("X-RateLimit-Scope", "global"),
        ]));

        assert!(parsed.global);
        assert_eq!(parsed.scope, Some(RateLimitScope::Global));
        assert_eq!(parsed.retry_after, Some(Duration::from_secs(2)));
        assert!(!parsed.has_bucket_info());
    }

    #[test]
    fn test_missing_headers() {
        let parsed = RateLimitHeaders::from_headers(&HeaderMap::new());
        assert_eq!(parsed, RateLimitHeaders::default());
        assert_eq!(parsed.reset_in(), None);
    }

    #[test]
    fn test_reset_in_from_past_epoch_is_zero() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[("X-RateLimit-Reset", "1000")]));
        assert_eq!(parsed.reset_in(), Some(Duration::ZERO));
    }

    #[test]
    fn test_too_many_requests_body() {
        let body = TooManyRequests::from_bytes(
            br#"{"message": "You are being rate limited.", "retry_after": 0.25, "global": false}"#,
        )
        .unwrap();
        assert_eq!(body.retry_after(), Some(Duration::from_millis(250)));
        assert!(TooManyRequests::from_bytes(b"not json").is_none());
    }

    #[test]
    fn test_body_without_retry_after() {
        let body = TooManyRequests::from_bytes(br#"{"message": "slow down"}"#).unwrap();
        assert_eq!(body.retry_after, None);
        assert_eq!(body.retry_after(), None);
        assert!(!body.global);
    }

    #[test]
    fn test_huge_durations_are_capped() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("Retry-After", "1e20"),
            ("X-RateLimit-Reset-After", "1e19"),
        ]));
        assert_eq!(parsed.retry_after, Some(MAX_WAIT));
        assert_eq!(parsed.reset_after, Some(MAX_WAIT));
        assert_eq!(parsed.reset_in(), Some(MAX_WAIT));

        let body = TooManyRequests::from_bytes(br#"{"retry_after": 1e20}"#).unwrap();
        assert_eq!(body.retry_after(), Some(MAX_WAIT));
    }

    #[test]
    fn test_invalid_durations_are_ignored() {
        let parsed = RateLimitHeaders::from_headers(&headers(&[
            ("Retry-After", "-3"),
            ("X-RateLimit-Reset-After", "NaN"),
        ]));
        assert_eq!(parsed.retry_after, None);
        assert_eq!(parsed.reset_after, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_never_overflows() {
        let now = Instant::now();
        assert_eq!(deadline(Duration::MAX), now + MAX_WAIT);
        assert_eq!(deadline(Duration::from_secs(2)), now + Duration::from_secs(2));
    }
}
