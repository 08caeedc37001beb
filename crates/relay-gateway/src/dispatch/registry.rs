//! Event dispatch registry
//!
//! Routes envelopes to typed and wildcard subscribers. Dispatch never blocks:
//! matching handlers are queued and a pump task runs them on a bounded pool
//! of tokio tasks, one task per invocation.

use crate::events::{
    decode_raw, Envelope, GatewayEvent, GuildCreate, GuildDelete, GuildMembersChunk,
    MessageCreate, MessageDelete, Payload, Ready, Resumed,
};
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Default number of handler invocations allowed to run at once
pub const DEFAULT_WORKERS: usize = 32;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type ErasedHandler = Arc<dyn Fn(Envelope) -> HandlerFuture + Send + Sync>;
type Decoder = fn(&Value) -> Result<Payload, serde_json::Error>;

/// Identifies a registered handler for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerToken(u64);

impl HandlerToken {
    #[inline]
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

/// Which envelopes a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Envelopes named `name`, delivered decoded as the type behind `type_id`
    Specific {
        name: &'static str,
        type_id: TypeId,
    },
    /// Every envelope
    Wildcard,
}

impl Matcher {
    #[must_use]
    pub fn specific<E: GatewayEvent>() -> Self {
        Self::Specific {
            name: E::NAME,
            type_id: TypeId::of::<E>(),
        }
    }

    #[must_use]
    pub fn matches(&self, event_name: &str) -> bool {
        match self {
            Self::Specific { name, .. } => *name == event_name,
            Self::Wildcard => true,
        }
    }
}

struct Subscription {
    token: HandlerToken,
    matcher: Matcher,
    handler: ErasedHandler,
    once: bool,
    fired: AtomicBool,
}

struct Job {
    token: HandlerToken,
    handler: ErasedHandler,
    envelope: Envelope,
}

/// Registry of event subscribers
///
/// Cheap to clone; clones share the same subscriptions and worker pool.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    entries: RwLock<Vec<Arc<Subscription>>>,
    decoders: RwLock<HashMap<&'static str, Decoder>>,
    next_token: AtomicU64,
    jobs: mpsc::UnboundedSender<Job>,
    /// Receiving end, until the pump is started inside a runtime
    pump: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
    workers: usize,
}

impl EventRegistry {
    /// Create a registry running at most `workers` handlers concurrently
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let registry = Self {
            inner: Arc::new(RegistryInner {
                entries: RwLock::new(Vec::new()),
                decoders: RwLock::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                jobs,
                pump: Mutex::new(Some(rx)),
                workers: workers.max(1),
            }),
        };

        registry.register_decoder::<Ready>();
        registry.register_decoder::<Resumed>();
        registry.register_decoder::<GuildCreate>();
        registry.register_decoder::<GuildDelete>();
        registry.register_decoder::<GuildMembersChunk>();
        registry.register_decoder::<MessageCreate>();
        registry.register_decoder::<MessageDelete>();

        registry
    }

    /// Subscribe to a typed event
    pub fn subscribe<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_typed::<E, F, Fut>(handler, false)
    }

    /// Subscribe to a typed event; the handler fires at most once
    pub fn subscribe_once<E, F, Fut>(&self, handler: F) -> HandlerToken
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe_typed::<E, F, Fut>(handler, true)
    }

    /// Subscribe to every envelope, including event names nobody declared
    pub fn subscribe_all<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let erased: ErasedHandler =
            Arc::new(move |envelope: Envelope| -> HandlerFuture { Box::pin(handler(envelope)) });
        self.insert(Matcher::Wildcard, erased, false)
    }

    /// Subscribe to the next envelope of any kind
    pub fn subscribe_all_once<F, Fut>(&self, handler: F) -> HandlerToken
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let erased: ErasedHandler =
            Arc::new(move |envelope: Envelope| -> HandlerFuture { Box::pin(handler(envelope)) });
        self.insert(Matcher::Wildcard, erased, true)
    }

    fn subscribe_typed<E, F, Fut>(&self, handler: F, once: bool) -> HandlerToken
    where
        E: GatewayEvent,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register_decoder::<E>();

        let erased: ErasedHandler = Arc::new(move |envelope: Envelope| -> HandlerFuture {
            // A second type declared under the same name is decoded on its own
            let event = envelope
                .downcast::<E>()
                .or_else(|| envelope.decode::<E>().ok().map(Arc::new));
            match event {
                Some(event) => Box::pin(handler(event)),
                None => Box::pin(async {}),
            }
        });
        self.insert(Matcher::specific::<E>(), erased, once)
    }

    fn insert(&self, matcher: Matcher, handler: ErasedHandler, once: bool) -> HandlerToken {
        let token = HandlerToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        self.inner.entries.write().push(Arc::new(Subscription {
            token,
            matcher,
            handler,
            once,
            fired: AtomicBool::new(false),
        }));
        tracing::trace!(token = token.0, matcher = ?matcher, "Handler registered");
        token
    }

    fn register_decoder<E: GatewayEvent>(&self) {
        self.inner
            .decoders
            .write()
            .entry(E::NAME)
            .or_insert(decode_as::<E>);
    }

    /// Remove a handler; returns false if the token is unknown
    ///
    /// Invocations already queued still run.
    pub fn remove(&self, token: HandlerToken) -> bool {
        let mut entries = self.inner.entries.write();
        match entries.iter().position(|s| s.token == token) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Queue every matching handler for this envelope
    ///
    /// Returns the number of invocations queued.
    pub fn dispatch(&self, mut envelope: Envelope) -> usize {
        let matching: Vec<Arc<Subscription>> = self
            .inner
            .entries
            .read()
            .iter()
            .filter(|s| s.matcher.matches(envelope.name()))
            .cloned()
            .collect();

        if matching.is_empty() {
            tracing::trace!(event = %envelope.name(), "No subscribers for event");
            return 0;
        }

        let mut decode_failed = false;
        if !envelope.has_payload() {
            let decoder = self.inner.decoders.read().get(envelope.name()).copied();
            if let Some(decode) = decoder {
                match decode(envelope.raw()) {
                    Ok(payload) => envelope.set_payload(payload),
                    Err(e) => {
                        decode_failed = true;
                        tracing::warn!(
                            event = %envelope.name(),
                            error = %e,
                            "Failed to decode event payload, skipping typed handlers"
                        );
                    }
                }
            }
        }

        let mut queued = 0;
        for subscription in matching {
            if decode_failed && matches!(subscription.matcher, Matcher::Specific { .. }) {
                continue;
            }
            if subscription.once {
                if subscription.fired.swap(true, Ordering::AcqRel) {
                    continue;
                }
                self.remove(subscription.token);
            }

            let job = Job {
                token: subscription.token,
                handler: subscription.handler.clone(),
                envelope: envelope.clone(),
            };
            if self.inner.jobs.send(job).is_err() {
                tracing::warn!(event = %envelope.name(), "Dispatch queue closed");
                break;
            }
            queued += 1;
        }

        self.ensure_pump();
        queued
    }

    /// Dispatch an event produced in-process
    pub fn emit<E>(&self, event: E) -> usize
    where
        E: GatewayEvent + serde::Serialize,
    {
        self.dispatch(Envelope::from_event(event))
    }

    fn ensure_pump(&self) {
        let mut slot = self.inner.pump.lock();
        if slot.is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No tokio runtime, queued handlers will run once one is available");
            return;
        };
        if let Some(rx) = slot.take() {
            let permits = Arc::new(Semaphore::new(self.inner.workers));
            runtime.spawn(run_pump(rx, permits));
        }
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("handlers", &self.handler_count())
            .field("workers", &self.inner.workers)
            .finish()
    }
}

fn decode_as<E: GatewayEvent>(raw: &Value) -> Result<Payload, serde_json::Error> {
    decode_raw::<E>(raw).map(|event| Arc::new(event) as Payload)
}

/// Runs queued jobs in server order, each on its own task
async fn run_pump(mut rx: mpsc::UnboundedReceiver<Job>, permits: Arc<Semaphore>) {
    while let Some(job) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        tokio::spawn(async move {
            let _permit = permit;
            let Job {
                token,
                handler,
                envelope,
            } = job;
            let name = envelope.name().to_string();

            let run = AssertUnwindSafe(async move { handler(envelope).await });
            if run.catch_unwind().await.is_err() {
                tracing::error!(event = %name, token = token.0, "Event handler panicked");
            }
        });
    }
    tracing::debug!("Dispatch pump stopped");
}
