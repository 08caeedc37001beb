//! REST rate limiting tests against a simulated API
//!
//! Run with: cargo test -p integration-tests --test rest_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use integration_tests::{ready_payload, rest_builder, MockGateway, MockRest, FRAME_TIMEOUT};
use relay::events::RateLimit;
use relay::{ClientError, Route, Snowflake};
use relay_gateway::protocol::OpCode;
use serde_json::{json, Value};
use tokio::sync::mpsc;

const CHANNEL_ID: Snowflake = Snowflake::new(290_926_798_999_357_250);

type Hits = Arc<AtomicUsize>;

fn channel_body() -> Json<Value> {
    Json(json!({ "id": "290926798999357250", "type": 0, "name": "general" }))
}

/// Serve `handler` on the channel route, counting requests
async fn serve_channel<H, T>(handler: H) -> Result<(MockRest, Hits)>
where
    H: axum::handler::Handler<T, Hits>,
    T: 'static,
{
    let hits = Hits::default();
    let router = Router::new()
        .route("/channels/:channel_id", get(handler))
        .with_state(hits.clone());
    Ok((MockRest::start(router).await?, hits))
}

// ============================================================================
// 429 handling
// ============================================================================

async fn throttled_once(State(hits): State<Hits>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "2"), ("x-ratelimit-bucket", "c0ffee")],
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": 2.0,
                "global": false
            })),
        )
            .into_response();
    }
    channel_body().into_response()
}

#[tokio::test]
async fn test_throttled_call_waits_and_succeeds() -> Result<()> {
    let (api, hits) = serve_channel(throttled_once).await?;
    let session = rest_builder(&api.base_url()).build()?;

    let (tx, mut notices) = mpsc::unbounded_channel();
    session.subscribe(move |event: Arc<RateLimit>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event);
        }
    });

    let started = Instant::now();
    let channel: Value = session
        .execute_json(&Route::get_channel(CHANNEL_ID), None)
        .await?;

    assert!(started.elapsed() >= Duration::from_millis(2_000));
    assert_eq!(channel["name"], "general");
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let notice = tokio::time::timeout(FRAME_TIMEOUT, notices.recv())
        .await?
        .context("no rate limit event")?;
    assert_eq!(notice.bucket, "c0ffee");
    assert_eq!(notice.route, "GET /channels/{channel_id}");
    assert_eq!(notice.retry_after_ms, 2_000);
    assert!(!notice.global);
    Ok(())
}

async fn throttled_without_delay(State(hits): State<Hits>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "message": "slow down" })),
        )
            .into_response();
    }
    channel_body().into_response()
}

#[tokio::test]
async fn test_throttle_without_retry_after_waits_one_second() -> Result<()> {
    let (api, hits) = serve_channel(throttled_without_delay).await?;
    let session = rest_builder(&api.base_url()).build()?;

    let started = Instant::now();
    session
        .execute(&Route::get_channel(CHANNEL_ID), None)
        .await?;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}

async fn always_throttled(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("retry-after", "0.05"), ("x-ratelimit-global", "true")],
        Json(json!({ "message": "slow down", "retry_after": 0.05, "global": true })),
    )
        .into_response()
}

#[tokio::test]
async fn test_throttle_retries_are_bounded() -> Result<()> {
    let (api, hits) = serve_channel(always_throttled).await?;
    let session = rest_builder(&api.base_url())
        .max_throttle_retries(2)
        .build()?;

    let err = session
        .execute(&Route::get_channel(CHANNEL_ID), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Throttled { retries: 2 }), "got {err:?}");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    Ok(())
}

// ============================================================================
// Buckets
// ============================================================================

async fn single_use_bucket(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        [
            ("x-ratelimit-limit", "1"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset-after", "1"),
            ("x-ratelimit-bucket", "abcd1234"),
        ],
        channel_body(),
    )
        .into_response()
}

#[tokio::test]
async fn test_exhausted_bucket_delays_next_call() -> Result<()> {
    let (api, hits) = serve_channel(single_use_bucket).await?;
    let session = rest_builder(&api.base_url()).build()?;
    let route = Route::get_channel(CHANNEL_ID);

    let first = session.execute(&route, None).await?;
    assert_eq!(first.rate_limit.bucket.as_deref(), Some("abcd1234"));
    assert_eq!(first.rate_limit.remaining, Some(0));

    let started = Instant::now();
    session.execute(&route, None).await?;
    assert!(started.elapsed() >= Duration::from_millis(800));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}

// ============================================================================
// Errors and retries
// ============================================================================

async fn unknown_channel(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "code": 10003, "message": "Unknown Channel" })),
    )
        .into_response()
}

#[tokio::test]
async fn test_error_status_is_remote_api_error() -> Result<()> {
    let (api, hits) = serve_channel(unknown_channel).await?;
    let session = rest_builder(&api.base_url()).build()?;

    let err = session
        .execute(&Route::get_channel(CHANNEL_ID), None)
        .await
        .unwrap_err();

    match err {
        ClientError::RemoteApi { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body.code, 10003);
            assert_eq!(body.message, "Unknown Channel");
        }
        other => panic!("expected a remote API error, got {other:?}"),
    }
    // Client errors are not retried
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

async fn bad_gateway_once(State(hits): State<Hits>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    channel_body().into_response()
}

#[tokio::test]
async fn test_bad_gateway_is_retried() -> Result<()> {
    let (api, hits) = serve_channel(bad_gateway_once).await?;
    let session = rest_builder(&api.base_url()).build()?;

    let response = session
        .execute(&Route::get_channel(CHANNEL_ID), None)
        .await?;

    assert_eq!(response.status, 200);
    assert_eq!(response.json::<Value>()?["id"], "290926798999357250");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_api_is_transport_error() -> Result<()> {
    // Nothing listens on port 1
    let session = rest_builder("http://127.0.0.1:1")
        .max_network_retries(1)
        .build()?;

    let err = session
        .execute(&Route::get_channel(CHANNEL_ID), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    Ok(())
}

// ============================================================================
// Gateway discovery
// ============================================================================

#[tokio::test]
async fn test_open_discovers_gateway_url() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let gateway_url = gateway.url();

    let router = Router::new().route(
        "/gateway/bot",
        get(move || {
            let url = gateway_url.clone();
            async move {
                Json(json!({
                    "url": url,
                    "shards": 1,
                    "session_start_limit": {
                        "total": 1000,
                        "remaining": 999,
                        "reset_after": 14_400_000,
                        "max_concurrency": 1
                    }
                }))
            }
        }),
    );
    let api = MockRest::start(router).await?;
    let session = rest_builder(&api.base_url()).build()?;
    assert!(session.gateway().gateway_url().is_none());

    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    peer.expect(OpCode::Identify).await?;
    peer.dispatch("READY", 1, ready_payload(None)).await?;
    opening.await??;

    assert!(session.is_ready());
    assert_eq!(session.gateway().gateway_url(), Some(gateway.url()));

    session.close().await;
    Ok(())
}
