//! Rate-limit bucket store
//!
//! Every call reserves one unit from its bucket before it is sent and settles
//! the reservation from the response headers afterwards. A bucket that nobody
//! has seen a response for yet allows a single call, whose response then
//! tells the store the real limit.
//!
//! The server may reveal that several routes share one bucket by returning
//! the same `X-RateLimit-Bucket` hash. From then on those routes resolve to
//! `"{hash}:{major parameters}"` instead of their route key.

use crate::error::RestError;
use crate::headers::RateLimitHeaders;
use crate::route::Route;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct BucketState {
    limit: Option<u32>,
    remaining: u32,
    reset_at: Option<Instant>,
    /// Reservations sent but not yet settled
    in_flight: u32,
}

#[derive(Debug)]
struct Bucket {
    state: Mutex<BucketState>,
    changed: Notify,
}

impl Bucket {
    fn new() -> Self {
        Self {
            state: Mutex::new(BucketState {
                limit: None,
                remaining: 1,
                reset_at: None,
                in_flight: 0,
            }),
            changed: Notify::new(),
        }
    }
}

/// Read-only view of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub limit: Option<u32>,
    pub remaining: u32,
    pub reset_in: Option<Duration>,
    pub in_flight: u32,
}

/// One unit of allowance taken from a bucket
///
/// Dropping an unsettled reservation refunds it.
#[derive(Debug)]
pub struct Reservation {
    key: String,
    bucket: Arc<Bucket>,
    settled: bool,
}

impl Reservation {
    pub fn key(&self) -> &str {
        &self.key
    }

    fn release(mut self, apply: impl FnOnce(&mut BucketState)) {
        {
            let mut state = self.bucket.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            apply(&mut state);
        }
        self.settled = true;
        self.bucket.changed.notify_waiters();
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            {
                let mut state = self.bucket.state.lock();
                state.in_flight = state.in_flight.saturating_sub(1);
                refund(&mut state);
            }
            self.bucket.changed.notify_waiters();
        }
    }
}

fn refund(state: &mut BucketState) {
    let cap = state.limit.unwrap_or(u32::MAX);
    state.remaining = state.remaining.saturating_add(1).min(cap);
}

/// Per-session bucket bookkeeping
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<String, Arc<Bucket>>,
    /// Route key to server bucket key
    routes: DashMap<String, String>,
}

impl BucketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key the route currently resolves to
    pub fn resolve(&self, route: &Route) -> String {
        let route_key = route.bucket_key();
        self.routes
            .get(&route_key)
            .map_or(route_key, |key| key.value().clone())
    }

    fn bucket(&self, key: &str) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket.clone();
        }
        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Bucket::new()))
            .clone()
    }

    /// Wait until the route's bucket has allowance and take one unit
    pub async fn acquire(
        &self,
        route: &Route,
        cancel: &CancellationToken,
    ) -> Result<Reservation, RestError> {
        loop {
            // The key is resolved again after every wait; a response may
            // have moved the route to a server-named bucket meanwhile
            let key = self.resolve(route);
            let bucket = self.bucket(&key);

            let changed = bucket.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            let wait_until = {
                let mut state = bucket.state.lock();
                let now = Instant::now();

                if state.reset_at.is_some_and(|reset| now >= reset) {
                    state.remaining = state.limit.unwrap_or(1);
                    state.reset_at = None;
                }
                if state.remaining == 0 && state.reset_at.is_none() && state.in_flight == 0 {
                    // Exhausted with no known reset and nothing in flight to
                    // report one; let a single call through
                    state.remaining = 1;
                }

                if state.remaining > 0 {
                    state.remaining -= 1;
                    state.in_flight += 1;
                    tracing::trace!(
                        bucket = %key,
                        remaining = state.remaining,
                        in_flight = state.in_flight,
                        "Reserved rate-limit unit"
                    );
                    return Ok(Reservation {
                        key,
                        bucket: bucket.clone(),
                        settled: false,
                    });
                }
                state.reset_at
            };

            match wait_until {
                Some(deadline) => {
                    tracing::debug!(
                        bucket = %key,
                        route = %route,
                        wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Bucket exhausted, waiting for reset"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RestError::Closed),
                        () = tokio::time::sleep_until(deadline) => {}
                        () = &mut changed => {}
                    }
                }
                None => {
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RestError::Closed),
                        () = &mut changed => {}
                    }
                }
            }
        }
    }

    /// Settle a reservation from response headers
    pub fn update(&self, reservation: Reservation, route: &Route, headers: &RateLimitHeaders) {
        let target = match &headers.bucket {
            Some(hash) => {
                let key = format!("{hash}:{}", route.major_key());
                let route_key = route.bucket_key();
                if self.routes.get(&route_key).map(|k| k.value().clone()) != Some(key.clone()) {
                    tracing::debug!(route = %route_key, bucket = %key, "Route mapped to server bucket");
                    self.routes.insert(route_key, key.clone());
                }
                key
            }
            None => reservation.key.clone(),
        };

        if target == reservation.key {
            reservation.release(|state| apply_headers(state, headers));
            return;
        }

        // The unit was taken from the route bucket; the server counts it
        // against the named one
        let bucket = self.bucket(&target);
        {
            let mut state = bucket.state.lock();
            apply_headers(&mut state, headers);
        }
        bucket.changed.notify_waiters();
        reservation.release(|_| {});
    }

    /// Return an unused unit, e.g. when a 429 carried no bucket headers
    pub fn refund(&self, reservation: Reservation) {
        reservation.release(refund);
    }

    pub fn snapshot(&self, route: &Route) -> Option<BucketSnapshot> {
        let bucket = self.buckets.get(&self.resolve(route))?.clone();
        let state = bucket.state.lock();
        Some(BucketSnapshot {
            limit: state.limit,
            remaining: state.remaining,
            reset_in: state
                .reset_at
                .map(|reset| reset.saturating_duration_since(Instant::now())),
            in_flight: state.in_flight,
        })
    }

    /// Number of buckets tracked
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn apply_headers(state: &mut BucketState, headers: &RateLimitHeaders) {
    if let Some(limit) = headers.limit {
        state.limit = Some(limit);
    }
    if let Some(remaining) = headers.remaining {
        // Calls still in flight were reserved locally but are not yet
        // counted by the server
        state.remaining = remaining.saturating_sub(state.in_flight);
    }
    if let Some(reset_in) = headers.reset_in() {
        state.reset_at = Some(crate::headers::deadline(reset_in));
    }
}
