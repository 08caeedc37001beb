//! Session construction

use crate::session::Session;
use relay_common::{
    try_init_tracing_with_config, ClientConfig, ClientResult, LogLevel, TracingConfig,
};
use relay_core::{Intents, ShardInfo};
use relay_gateway::protocol::{IdentifyProperties, StatusUpdatePayload};
use relay_gateway::{DefaultConnector, EventRegistry, GatewayConfig, GatewayConnector, GatewayManager};
use relay_rest::{RateLimitNotice, RestClient, RestConfig};
use std::sync::Arc;
use std::time::Duration;

/// Configures and builds a [`Session`]
pub struct SessionBuilder {
    config: ClientConfig,
    shard: Option<(u32, u32)>,
    http_client: Option<reqwest::Client>,
    connector: Option<Arc<dyn GatewayConnector>>,
    properties: IdentifyProperties,
    presence: Option<StatusUpdatePayload>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            shard: None,
            http_client: None,
            connector: None,
            properties: IdentifyProperties::default(),
            presence: None,
        }
    }

    #[must_use]
    pub fn intents(mut self, intents: Intents) -> Self {
        self.config.intents = intents;
        self
    }

    /// Shard index and count; validated by `build`
    #[must_use]
    pub fn shard(mut self, id: u32, count: u32) -> Self {
        self.shard = Some((id, count));
        self
    }

    #[must_use]
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.config.gateway_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Install a tracing subscriber at this verbosity when building
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = Some(level);
        self
    }

    #[must_use]
    pub fn dispatch_workers(mut self, workers: usize) -> Self {
        self.config.dispatch_workers = workers;
        self
    }

    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.gateway.max_reconnect_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn handshake_attempts(mut self, attempts: u32) -> Self {
        self.config.gateway.handshake_attempts = attempts;
        self
    }

    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.gateway.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Reconnect backoff bounds
    #[must_use]
    pub fn backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.gateway.backoff_base_ms = base.as_millis() as u64;
        self.config.gateway.backoff_max_ms = max.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn max_throttle_retries(mut self, retries: u32) -> Self {
        self.config.rest.max_throttle_retries = retries;
        self
    }

    #[must_use]
    pub fn max_network_retries(mut self, retries: u32) -> Self {
        self.config.rest.max_network_retries = retries;
        self
    }

    #[must_use]
    pub fn global_requests_per_second(mut self, rate: u32) -> Self {
        self.config.rest.global_requests_per_second = rate;
        self
    }

    /// HTTP client used for REST calls, e.g. one routed through a proxy
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Socket transport for the gateway
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn GatewayConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Presence sent with Identify
    #[must_use]
    pub fn presence(mut self, presence: StatusUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    pub fn build(self) -> ClientResult<Session> {
        let mut config = self.config;
        if let Some((id, count)) = self.shard {
            config.shard = ShardInfo::new(id, count)?;
        }
        config.validate()?;

        if let Some(level) = config.log_level {
            if try_init_tracing_with_config(TracingConfig::from_log_level(level)).is_err() {
                tracing::debug!("Tracing already initialized, keeping existing subscriber");
            }
        }

        let registry = EventRegistry::new(config.dispatch_workers);

        let rest_config = RestConfig::from_client_config(&config);
        let rest = match self.http_client {
            Some(http) => RestClient::with_http_client(rest_config, http),
            None => RestClient::new(rest_config)?,
        };
        let events = registry.clone();
        rest.set_rate_limit_observer(Arc::new(move |notice: &RateLimitNotice| {
            events.emit(relay_gateway::events::RateLimit {
                bucket: notice.bucket.clone(),
                route: notice.route.clone(),
                retry_after_ms: notice.retry_after.as_millis() as u64,
                global: notice.global,
            });
        }));

        let mut gateway_config = GatewayConfig::from_client_config(&config);
        gateway_config.properties = self.properties;
        gateway_config.presence = self.presence;
        let connector = self.connector.unwrap_or_else(|| {
            Arc::new(DefaultConnector::new(gateway_config.handshake_timeout))
        });
        let gateway = GatewayManager::new(gateway_config, connector, registry.clone());

        tracing::debug!(
            shard = %config.shard,
            intents = %config.intents,
            "Session built"
        );
        Ok(Session::from_parts(config, gateway, rest, registry))
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("shard", &self.shard)
            .field("custom_http_client", &self.http_client.is_some())
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}
