//! Gateway lifecycle tests against a simulated gateway server
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use integration_tests::{
    message_create_payload, ready_payload, test_builder, wait_until, GatewayPeer, MockGateway,
    FRAME_TIMEOUT, SESSION_ID,
};
use relay::events::{Connect, Disconnect, MessageCreate};
use relay::{ClientError, ConnectionState, Envelope, Session};
use relay_gateway::protocol::{GatewayMessage, OpCode};
use serde_json::json;
use tokio::sync::mpsc;

/// Open `session` against `gateway` and complete Hello, Identify and READY
async fn open_ready(session: &Session, gateway: &mut MockGateway) -> Result<GatewayPeer> {
    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    peer.expect(OpCode::Identify).await?;
    peer.dispatch("READY", 1, ready_payload(Some(&gateway.url()))).await?;

    opening.await??;
    Ok(peer)
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Result<T> {
    tokio::time::timeout(FRAME_TIMEOUT, rx.recv())
        .await
        .context("timed out waiting for an event")?
        .context("event channel closed")
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_hello_identify_ready() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let (tx, mut connects) = mpsc::unbounded_channel();
    session.subscribe(move |event: Arc<Connect>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event.resumed);
        }
    });

    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;

    let identify = peer.expect(OpCode::Identify).await?;
    let d = identify.d.context("identify without payload")?;
    assert_eq!(d["token"], "Bot MTA4.test-token");
    assert_eq!(d["shard"], json!([0, 1]));
    assert!(d["intents"].is_u64());
    assert_eq!(d["properties"]["browser"], "relay");
    assert!(!session.is_ready());

    peer.dispatch("READY", 1, ready_payload(None)).await?;
    opening.await??;

    assert!(session.is_ready());
    assert_eq!(session.state(), ConnectionState::Connected);
    assert!(!next(&mut connects).await?);

    let resume = session.gateway().resume_state();
    assert_eq!(resume.session_id.as_deref(), Some(SESSION_ID));
    assert_eq!(resume.sequence, Some(1));

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_open_twice_is_rejected() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;
    let _peer = open_ready(&session, &mut gateway).await?;

    let err = session.open().await.unwrap_err();
    assert!(matches!(err, ClientError::Configuration(ref m) if m == "already open"));
    assert!(session.is_ready());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_fatal_close_fails_open() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    peer.expect(OpCode::Identify).await?;
    peer.close(4004).await?;

    let err = opening.await?.unwrap_err();
    assert!(matches!(err, ClientError::Handshake(_)), "got {err:?}");
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_close_sends_clean_close_frame() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;
    let mut peer = open_ready(&session, &mut gateway).await?;

    session.close().await;
    assert_eq!(peer.expect_close().await?, Some(1000));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert!(!session.gateway().resume_state().can_resume());

    // Idempotent
    session.close().await;
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_unregistered_event_reaches_only_wildcards() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let typed_calls = Arc::new(AtomicUsize::new(0));
    let (typed_tx, mut typed) = mpsc::unbounded_channel();
    session.subscribe({
        let typed_calls = typed_calls.clone();
        move |event: Arc<MessageCreate>| {
            typed_calls.fetch_add(1, Ordering::SeqCst);
            let tx = typed_tx.clone();
            async move {
                let _ = tx.send(event.content.clone());
            }
        }
    });

    let (all_tx, mut all) = mpsc::unbounded_channel();
    session.subscribe_all(move |envelope: Envelope| {
        let tx = all_tx.clone();
        async move {
            let _ = tx.send(envelope);
        }
    });

    let mut peer = open_ready(&session, &mut gateway).await?;
    peer.dispatch("SOMETHING_NEW", 2, json!({ "answer": 42 })).await?;

    let envelope = loop {
        let envelope = next(&mut all).await?;
        if envelope.name() == "SOMETHING_NEW" {
            break envelope;
        }
    };
    assert_eq!(envelope.sequence(), Some(2));
    assert_eq!(envelope.raw()["answer"], 42);
    assert_eq!(typed_calls.load(Ordering::SeqCst), 0);

    peer.dispatch("MESSAGE_CREATE", 3, message_create_payload("hello")).await?;
    assert_eq!(next(&mut typed).await?, "hello");

    let envelope = loop {
        let envelope = next(&mut all).await?;
        if envelope.name() == "MESSAGE_CREATE" {
            break envelope;
        }
    };
    let typed_view = envelope
        .downcast::<MessageCreate>()
        .context("wildcard envelope carries the typed payload")?;
    assert_eq!(typed_view.content, "hello");
    assert_eq!(typed_calls.load(Ordering::SeqCst), 1);

    session.close().await;
    Ok(())
}

// ============================================================================
// Reconnect and resume
// ============================================================================

#[tokio::test]
async fn test_resume_after_connection_drop() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let (tx, mut disconnects) = mpsc::unbounded_channel();
    session.subscribe(move |event: Arc<Disconnect>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event.will_reconnect);
        }
    });
    let (tx, mut connects) = mpsc::unbounded_channel();
    session.subscribe(move |event: Arc<Connect>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event.resumed);
        }
    });

    let mut peer = open_ready(&session, &mut gateway).await?;
    assert!(!next(&mut connects).await?);

    peer.dispatch("MESSAGE_CREATE", 5, message_create_payload("before drop")).await?;
    wait_until(|| session.gateway().resume_state().sequence == Some(5)).await?;

    peer.drop_connection();
    assert!(next(&mut disconnects).await?);

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    let resume = peer.expect(OpCode::Resume).await?;
    let d = resume.d.context("resume without payload")?;
    assert_eq!(d["session_id"], SESSION_ID);
    assert_eq!(d["seq"], 5);
    assert_eq!(d["token"], "Bot MTA4.test-token");

    peer.dispatch("RESUMED", 6, json!({})).await?;
    assert!(next(&mut connects).await?);
    assert!(session.is_ready());

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_reconnect_ceiling_ends_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url())
        .max_reconnect_attempts(2)
        .build()?;

    let (tx, mut disconnects) = mpsc::unbounded_channel();
    session.subscribe(move |event: Arc<Disconnect>| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(event.will_reconnect);
        }
    });

    let peer = open_ready(&session, &mut gateway).await?;
    peer.drop_connection();
    assert!(next(&mut disconnects).await?);

    // Neither reconnect gets as far as Hello
    for _ in 0..2 {
        gateway.accept().await?.drop_connection();
    }

    assert!(!next(&mut disconnects).await?);
    wait_until(|| session.state() == ConnectionState::Disconnected).await?;
    assert!(!session.is_ready());
    Ok(())
}

#[tokio::test]
async fn test_reconnect_request_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;
    let mut peer = open_ready(&session, &mut gateway).await?;

    peer.send(GatewayMessage::reconnect()).await?;
    // The client keeps the session resumable when it hangs up
    assert_eq!(peer.expect_close().await?, Some(4000));

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    let resume = peer.expect(OpCode::Resume).await?;
    assert_eq!(resume.d.context("resume without payload")?["seq"], 1);

    peer.dispatch("RESUMED", 2, json!({})).await?;
    wait_until(|| session.is_ready()).await?;

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_non_resumable_invalid_session_identifies_again() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;
    let mut peer = open_ready(&session, &mut gateway).await?;

    peer.send(GatewayMessage::invalid_session(false)).await?;
    wait_until(|| !session.gateway().resume_state().can_resume()).await?;
    assert!(!session.is_ready());

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    let identify = peer.recv().await?;
    if identify.op != OpCode::Identify {
        bail!("expected a fresh Identify, got {identify}");
    }

    peer.dispatch("READY", 1, ready_payload(None)).await?;
    wait_until(|| session.is_ready()).await?;

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_resumable_invalid_session_keeps_session() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;
    let mut peer = open_ready(&session, &mut gateway).await?;

    peer.send(GatewayMessage::invalid_session(true)).await?;

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    peer.expect(OpCode::Resume).await?;
    assert_eq!(
        session.gateway().resume_state().session_id.as_deref(),
        Some(SESSION_ID)
    );

    session.close().await;
    Ok(())
}

// ============================================================================
// Heartbeat
// ============================================================================

#[tokio::test]
async fn test_heartbeat_ack_reports_latency() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });
    let mut peer = gateway.accept().await?;
    peer.hello(200).await?;
    peer.expect(OpCode::Identify).await?;
    peer.dispatch("READY", 1, ready_payload(None)).await?;
    opening.await??;

    let beat = peer.recv_any().await?;
    assert_eq!(beat.op, OpCode::Heartbeat);
    peer.send(GatewayMessage::heartbeat_ack()).await?;
    wait_until(|| session.heartbeat_latency().is_some()).await?;

    // A heartbeat request from the server is answered right away
    peer.send(GatewayMessage::heartbeat(None)).await?;
    let reply = tokio::time::timeout(Duration::from_millis(150), peer.recv_any()).await??;
    assert_eq!(reply.op, OpCode::Heartbeat);
    assert_eq!(reply.d, Some(json!(1)));

    session.close().await;
    Ok(())
}

#[tokio::test]
async fn test_missing_ack_reconnects_and_resumes() -> Result<()> {
    let mut gateway = MockGateway::start().await?;
    let session = test_builder(&gateway.url()).build()?;

    let opening = tokio::spawn({
        let session = session.clone();
        async move { session.open().await }
    });
    let mut peer = gateway.accept().await?;
    peer.hello(300).await?;
    peer.expect(OpCode::Identify).await?;
    peer.dispatch("READY", 1, ready_payload(None)).await?;
    opening.await??;

    // Never acknowledge from here on
    let silent = tokio::spawn(async move {
        while let Ok(message) = peer.recv_any().await {
            if message.op != OpCode::Heartbeat {
                break;
            }
        }
    });

    let mut peer = gateway.accept().await?;
    peer.hello(45_000).await?;
    peer.expect(OpCode::Resume).await?;
    peer.dispatch("RESUMED", 2, json!({})).await?;
    wait_until(|| session.is_ready()).await?;

    session.close().await;
    silent.abort();
    Ok(())
}
