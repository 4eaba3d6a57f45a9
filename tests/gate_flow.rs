//! End-to-end tests: real listener, real HTTP client.

use std::collections::HashSet;

use preimage_gate::config::{GateConfig, SecretPolicy};
use reqwest::StatusCode;
use serde_json::{json, Value};

mod common;

async fn submit(gate: &common::RunningGate, preimage: &str) -> reqwest::Response {
    common::client()
        .post(gate.url("/preimages"))
        .query(&[("preimage", preimage)])
        .send()
        .await
        .expect("gate unreachable")
}

#[tokio::test]
async fn test_submit_then_duplicate() {
    let gate = common::start_gate(GateConfig::default()).await;

    let first = submit(&gate, "abc").await;
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = first.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.contains("Max-Age=3600"));
    assert!(cookie.contains("HttpOnly"));

    let again = submit(&gate, "abc").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert!(again.headers().get("set-cookie").is_none());
    let body: Value = again.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Preimage already exists" }));
}

#[tokio::test]
async fn test_secret_is_stripped_before_upstream() {
    let (backend, seen) = common::start_capture_backend().await;
    let mut config = GateConfig::default();
    config.downstream.upstream_url = Some(format!("http://{backend}"));
    let gate = common::start_gate(config).await;
    let client = common::client();

    let res = submit(&gate, "preimage-1").await;
    let secret = common::secret_from(&res);

    let denied = client
        .post(gate.url("/chat"))
        .json(&json!({ "query": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert!(seen.lock().unwrap().is_empty(), "unauthenticated request reached upstream");

    let allowed = client
        .post(gate.url("/chat"))
        .header("cookie", format!("secret={secret}; theme=dark"))
        .json(&json!({ "query": "hi", "secret": secret }))
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.text().await.unwrap(), "ok");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "/chat");
    assert_eq!(seen[0].cookie.as_deref(), Some("theme=dark"));
    let forwarded: Value = serde_json::from_slice(&seen[0].body).unwrap();
    assert_eq!(forwarded, json!({ "query": "hi" }));
}

#[tokio::test]
async fn test_single_use_secret_over_http() {
    let gate = common::start_gate(GateConfig::default()).await;
    let client = common::client();

    let secret = common::secret_from(&submit(&gate, "once").await);
    let call = || {
        client
            .post(gate.url("/chat"))
            .header("cookie", format!("secret={secret}"))
            .body("{}")
            .send()
    };

    assert_eq!(call().await.unwrap().status(), StatusCode::OK);
    assert_eq!(call().await.unwrap().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_secret_over_http() {
    let mut config = GateConfig::default();
    config.secrets.policy = SecretPolicy::Session;
    let gate = common::start_gate(config).await;
    let client = common::client();

    let secret = common::secret_from(&submit(&gate, "session").await);
    for _ in 0..3 {
        let res = client
            .post(gate.url("/chat"))
            .header("cookie", format!("secret={secret}"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_capacity_eviction_over_http() {
    let mut config = GateConfig::default();
    config.ledger.capacity = 3;
    let gate = common::start_gate(config).await;

    for p in ["p1", "p2", "p3", "p4", "p5"] {
        assert_eq!(submit(&gate, p).await.status(), StatusCode::OK);
    }

    // p1 and p2 were evicted, so they are accepted again; p5 is still held.
    assert_eq!(submit(&gate, "p5").await.status(), StatusCode::CONFLICT);
    assert_eq!(submit(&gate, "p1").await.status(), StatusCode::OK);
    assert_eq!(submit(&gate, "p2").await.status(), StatusCode::OK);
    // Those two inserts pushed out p3 and p4 in turn.
    assert_eq!(submit(&gate, "p3").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_submissions() {
    let gate = common::start_gate(GateConfig::default()).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let url = gate.url("/preimages");
        // Two submissions per value.
        let preimage = format!("value-{}", i / 2);
        tasks.push(tokio::spawn(async move {
            let res = common::client()
                .post(url)
                .query(&[("preimage", preimage.as_str())])
                .send()
                .await
                .unwrap();
            let secret = (res.status() == StatusCode::OK).then(|| common::secret_from(&res));
            (res.status(), secret)
        }));
    }

    let mut ok = 0;
    let mut conflict = 0;
    let mut secrets = HashSet::new();
    for task in tasks {
        let (status, secret) = task.await.unwrap();
        match status {
            StatusCode::OK => {
                ok += 1;
                assert!(secrets.insert(secret.unwrap()), "secret issued twice");
            }
            StatusCode::CONFLICT => conflict += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(conflict, 10);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let gate = common::start_gate(GateConfig::default()).await;

    let res = common::client()
        .get(gate.url("/chat"))
        .header("x-request-id", "test-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.headers()["x-request-id"], "test-123");
}
