//! Rate-limited REST client
//!
//! Every REST call goes through [`RestClient::execute`]: reserve a unit from
//! the route's bucket, pass the global limiter, send, then settle the bucket
//! from the response headers. 429 responses are retried after exactly the
//! advertised delay; network failures and 502s are retried with backoff.

use crate::bucket::BucketStore;
use crate::error::RestError;
use crate::global::GlobalLimiter;
use crate::headers::{RateLimitHeaders, TooManyRequests};
use crate::route::Route;
use rand::Rng;
use relay_common::{ApiErrorBody, ClientConfig};
use relay_core::{SessionStartLimit, Token};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay before a 429 retry when the server gave none
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

/// REST client settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub token: Token,
    pub api_url: String,
    pub request_timeout: Duration,
    pub max_network_retries: u32,
    pub max_throttle_retries: u32,
    pub global_requests_per_second: u32,
    pub user_agent: String,
    /// First delay of the network retry backoff
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            token: config.token.clone(),
            api_url: config.api_url.clone(),
            request_timeout: config.rest.request_timeout(),
            max_network_retries: config.rest.max_network_retries,
            max_throttle_retries: config.rest.max_throttle_retries,
            global_requests_per_second: config.rest.global_requests_per_second,
            user_agent: config.rest.user_agent.clone(),
            retry_base: Duration::from_millis(500),
            retry_max: Duration::from_secs(10),
        }
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .retry_base
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.retry_max);
        // Jitter within the upper half keeps retries from bunching up
        let ms = exp.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
    }
}

/// Reported to the observer on every 429
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitNotice {
    pub bucket: String,
    pub route: String,
    pub retry_after: Duration,
    pub global: bool,
}

pub type RateLimitObserver = Arc<dyn Fn(&RateLimitNotice) + Send + Sync>;

/// Successful response
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub rate_limit: RateLimitHeaders,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayBot {
    pub url: String,
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestInner>,
}

struct RestInner {
    config: RestConfig,
    http: reqwest::Client,
    buckets: BucketStore,
    global: GlobalLimiter,
    observer: parking_lot::RwLock<Option<RateLimitObserver>>,
    cancel: CancellationToken,
}

/// What one attempt produced
enum Attempt {
    Done(RestResponse),
    Throttled {
        retry_after: Duration,
        global: bool,
        bucket: String,
    },
    Transient(String),
}

impl RestClient {
    /// Client with its own HTTP connection pool
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RestError::Configuration(e.to_string()))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Client over a caller-supplied HTTP client, e.g. one set up with a proxy
    #[must_use]
    pub fn with_http_client(config: RestConfig, http: reqwest::Client) -> Self {
        let global = GlobalLimiter::new(config.global_requests_per_second);
        Self {
            inner: Arc::new(RestInner {
                config,
                http,
                buckets: BucketStore::new(),
                global,
                observer: parking_lot::RwLock::new(None),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &RestConfig {
        &self.inner.config
    }

    pub fn buckets(&self) -> &BucketStore {
        &self.inner.buckets
    }

    pub fn global(&self) -> &GlobalLimiter {
        &self.inner.global
    }

    /// Called on every 429
    pub fn set_rate_limit_observer(&self, observer: RateLimitObserver) {
        *self.inner.observer.write() = Some(observer);
    }

    /// Unblock pending waits and refuse further calls
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Send a request on `route` and return the successful response
    pub async fn execute(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> Result<RestResponse, RestError> {
        let config = &self.inner.config;
        let cancel = &self.inner.cancel;
        let mut throttled = 0u32;
        let mut failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RestError::Closed);
            }

            match self.attempt(route, body).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Throttled {
                    retry_after,
                    global,
                    bucket,
                } => {
                    tracing::warn!(
                        route = %route,
                        bucket = %bucket,
                        retry_after_ms = retry_after.as_millis() as u64,
                        global,
                        retries = throttled,
                        "Rate limited"
                    );
                    let observer = self.inner.observer.read().clone();
                    if let Some(observer) = observer {
                        observer(&RateLimitNotice {
                            bucket,
                            route: route.to_string(),
                            retry_after,
                            global,
                        });
                    }

                    if throttled >= config.max_throttle_retries {
                        return Err(RestError::Throttled { retries: throttled });
                    }
                    throttled += 1;
                    self.pause(retry_after).await?;
                }
                Attempt::Transient(reason) => {
                    if failures >= config.max_network_retries {
                        return Err(RestError::Transport(format!(
                            "{reason} (after {failures} retries)"
                        )));
                    }
                    failures += 1;
                    let delay = config.retry_delay(failures);
                    tracing::warn!(
                        route = %route,
                        error = %reason,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    self.pause(delay).await?;
                }
            }
        }
    }

    /// `execute` and decode the JSON body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> Result<T, RestError> {
        self.execute(route, body).await?.json()
    }

    /// Gateway URL and session-start allowance for this credential
    pub async fn gateway_bot(&self) -> Result<GatewayBot, RestError> {
        self.execute_json(&Route::gateway_bot(), None).await
    }

    async fn attempt(&self, route: &Route, body: Option<&Value>) -> Result<Attempt, RestError> {
        let inner = &self.inner;
        let reservation = inner.buckets.acquire(route, &inner.cancel).await?;
        inner.global.acquire(&inner.cancel).await?;

        let url = format!("{}{}", inner.config.api_url.trim_end_matches('/'), route.path());
        let mut request = inner
            .http
            .request(route.method().clone(), &url)
            .timeout(inner.config.request_timeout)
            .header(AUTHORIZATION, inner.config.token.as_str())
            .header(USER_AGENT, inner.config.user_agent.as_str());
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(route = %route, bucket = %reservation.key(), "Sending request");

        // In-flight calls finish, but a closed client discards the result
        let sent = request.send().await;
        if inner.cancel.is_cancelled() {
            return Err(RestError::Closed);
        }
        let response = match sent {
            Ok(response) => response,
            // Dropping the reservation refunds it
            Err(e) => return Ok(Attempt::Transient(e.to_string())),
        };

        let status = response.status();
        let headers = RateLimitHeaders::from_headers(response.headers());
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return Ok(Attempt::Transient(e.to_string())),
        };
        if inner.cancel.is_cancelled() {
            return Err(RestError::Closed);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = TooManyRequests::from_bytes(&bytes).unwrap_or_default();
            let retry_after = headers
                .retry_after
                .or_else(|| body.retry_after())
                .unwrap_or(FALLBACK_RETRY_AFTER);
            let global = headers.global || body.global;
            let bucket = headers
                .bucket
                .clone()
                .unwrap_or_else(|| reservation.key().to_string());

            // A throttled attempt does not spend allowance unless the
            // server says otherwise
            if headers.has_bucket_info() {
                inner.buckets.update(reservation, route, &headers);
            } else {
                inner.buckets.refund(reservation);
            }
            if global {
                inner.global.block_for(retry_after);
            }
            return Ok(Attempt::Throttled {
                retry_after,
                global,
                bucket,
            });
        }

        inner.buckets.update(reservation, route, &headers);

        if status == StatusCode::BAD_GATEWAY {
            return Ok(Attempt::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(RestError::RemoteApi {
                status: status.as_u16(),
                body: ApiErrorBody::from_bytes(&bytes),
            });
        }

        tracing::trace!(route = %route, status = status.as_u16(), "Request succeeded");
        Ok(Attempt::Done(RestResponse {
            status: status.as_u16(),
            rate_limit: headers,
            body: bytes,
        }))
    }

    async fn pause(&self, delay: Duration) -> Result<(), RestError> {
        tokio::select! {
            () = self.inner.cancel.cancelled() => Err(RestError::Closed),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("api_url", &self.inner.config.api_url)
            .field("buckets", &self.inner.buckets.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
