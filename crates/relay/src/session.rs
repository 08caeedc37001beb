//! Session
//!
//! A [`Session`] owns everything one bot connection needs: the gateway
//! manager, the event registry and the REST client with its buckets.
//! Nothing is shared between sessions.

use crate::builder::SessionBuilder;
use relay_common::{ClientConfig, ClientError, ClientResult};
use relay_gateway::protocol::{RequestMembersPayload, StatusUpdatePayload};
use relay_gateway::{
    ConnectionState, Envelope, EventRegistry, GatewayEvent, GatewayManager, HandlerToken,
};
use relay_rest::{GatewayBot, RestClient, RestResponse, Route};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    gateway: GatewayManager,
    rest: RestClient,
    registry: EventRegistry,
}

impl Session {
    /// Session with default settings around a credential
    pub fn new(token: &str) -> ClientResult<Self> {
        Self::builder(token)?.build()
    }

    pub fn builder(token: &str) -> ClientResult<SessionBuilder> {
        Ok(SessionBuilder::new(ClientConfig::new(token)?))
    }

    /// Session configured from `RELAY_*` environment variables
    pub fn from_env() -> ClientResult<Self> {
        SessionBuilder::new(ClientConfig::from_env()?).build()
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        gateway: GatewayManager,
        rest: RestClient,
        registry: EventRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                config,
                gateway,
                rest,
                registry,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn gateway(&self) -> &GatewayManager {
        &self.inner.gateway
    }

    pub fn rest(&self) -> &RestClient {
        &self.inner.rest
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    /// Connect to the gateway and wait until the session is ready
    ///
    /// Without a configured gateway URL the URL and the session-start limit
    /// are fetched from `GET /gateway/bot` first.
    pub async fn open(&self) -> ClientResult<()> {
        if self.inner.rest.is_closed() {
            return Err(ClientError::Closed);
        }

        let gateway = &self.inner.gateway;
        if gateway.gateway_url().is_none() {
            let bot = self.inner.rest.gateway_bot().await?;
            tracing::info!(
                url = %bot.url,
                shards = bot.shards,
                remaining = bot.session_start_limit.remaining,
                "Resolved gateway"
            );
            gateway.set_gateway_url(bot.url);
            gateway
                .update_session_start_limit(bot.session_start_limit)
                .await;
        }

        gateway.open().await?;
        Ok(())
    }

    /// Close the gateway and stop all REST calls; the session cannot be reopened
    pub async fn close(&self) {
        self.inner.gateway.close().await;
        self.inner.rest.close();
    }

    pub fn subscribe<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.subscribe::<E, F, Fut>(handler)
    }

    pub fn subscribe_once<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.subscribe_once::<E, F, Fut>(handler)
    }

    /// Receive every event, including ones without a registered type
    pub fn subscribe_all<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.subscribe_all(handler)
    }

    /// Receive the next event of any kind, once
    pub fn subscribe_all_once<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.subscribe_all_once(handler)
    }

    pub fn remove_handler(&self, token: HandlerToken) -> bool {
        self.inner.registry.remove(token)
    }

    pub async fn execute(&self, route: &Route, body: Option<&Value>) -> ClientResult<RestResponse> {
        Ok(self.inner.rest.execute(route, body).await?)
    }

    pub async fn execute_json<T: serde::de::DeserializeOwned>(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> ClientResult<T> {
        Ok(self.inner.rest.execute_json(route, body).await?)
    }

    pub async fn gateway_bot(&self) -> ClientResult<GatewayBot> {
        Ok(self.inner.rest.gateway_bot().await?)
    }

    pub async fn update_status(&self, status: &StatusUpdatePayload) -> ClientResult<()> {
        Ok(self.inner.gateway.update_status(status).await?)
    }

    /// Request guild members; returns the nonce the answering chunks carry
    pub async fn request_members(&self, mut request: RequestMembersPayload) -> ClientResult<String> {
        let nonce = request
            .nonce
            .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
            .clone();
        self.inner.gateway.request_members(&request).await?;
        Ok(nonce)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.gateway.is_ready()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.gateway.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.gateway.subscribe_state()
    }

    pub fn heartbeat_latency(&self) -> Option<Duration> {
        self.inner.gateway.heartbeat_latency()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("shard", &self.inner.config.shard)
            .field("state", &self.state())
            .field("handlers", &self.inner.registry.handler_count())
            .finish()
    }
}
