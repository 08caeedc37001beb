//! Payload fixtures and session setup

use relay::{Session, SessionBuilder};
use serde_json::{json, Value};
use std::time::Duration;

pub const TEST_TOKEN: &str = "Bot MTA4.test-token";
pub const SESSION_ID: &str = "c0ffee0123456789";

/// READY for [`SESSION_ID`]; `resume_url` is advertised as the resume gateway
pub fn ready_payload(resume_url: Option<&str>) -> Value {
    let mut ready = json!({
        "v": 10,
        "user": {
            "id": "80351110224678912",
            "username": "relay-test",
            "discriminator": "0001",
            "bot": true
        },
        "guilds": [{ "id": "41771983423143937", "unavailable": true }],
        "session_id": SESSION_ID,
        "shard": [0, 1]
    });
    if let Some(url) = resume_url {
        ready["resume_gateway_url"] = json!(url);
    }
    ready
}

pub fn message_create_payload(content: &str) -> Value {
    json!({
        "id": "334385199974967042",
        "channel_id": "290926798999357250",
        "guild_id": "41771983423143937",
        "author": {
            "id": "80351110224678912",
            "username": "someone",
            "discriminator": "1337"
        },
        "content": content,
        "timestamp": "2026-10-16T12:00:00.000000+00:00"
    })
}

/// Builder aimed at the simulated servers, with short reconnect delays
pub fn test_builder(gateway_url: &str) -> SessionBuilder {
    Session::builder(TEST_TOKEN)
        .expect("test token is valid")
        .gateway_url(gateway_url)
        .api_url("http://127.0.0.1:1")
        .backoff(Duration::from_millis(10), Duration::from_millis(50))
        .handshake_timeout(Duration::from_secs(10))
}

pub fn rest_builder(api_url: &str) -> SessionBuilder {
    Session::builder(TEST_TOKEN)
        .expect("test token is valid")
        .api_url(api_url)
        .max_network_retries(2)
}
