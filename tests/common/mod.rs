//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{body::Bytes, http::HeaderMap, Router};
use preimage_gate::config::GateConfig;
use preimage_gate::http::Downstream;
use preimage_gate::{GateServer, PreimageLedger, SecretIssuer, Shutdown};
use tokio::net::TcpListener;

/// What the mock upstream saw for one request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub path: String,
    pub cookie: Option<String>,
    pub body: Bytes,
}

/// Start a mock upstream that records every request and answers `200 ok`.
pub async fn start_capture_backend() -> (SocketAddr, Arc<Mutex<Vec<Captured>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    let app = Router::new().fallback(
        move |uri: axum::http::Uri, headers: HeaderMap, body: Bytes| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(Captured {
                    path: uri.path().to_string(),
                    cookie: headers
                        .get("cookie")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    body,
                });
                "ok"
            }
        },
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, seen)
}

/// A running gate plus the handle that stops it.
pub struct RunningGate {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl RunningGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a gate on an ephemeral port with an in-memory ledger.
pub async fn start_gate(mut config: GateConfig) -> RunningGate {
    config.listener.bind_address = "127.0.0.1:0".into();

    let ledger = PreimageLedger::in_memory(config.ledger.capacity).unwrap();
    let issuer = Arc::new(SecretIssuer::from_config(&config.secrets));
    let downstream = Downstream::from_config(&config.downstream).unwrap();
    let server = GateServer::new(config, ledger, issuer, downstream);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    RunningGate { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Pull the secret out of a submission response.
pub fn secret_from(res: &reqwest::Response) -> String {
    let header = res
        .headers()
        .get("set-cookie")
        .expect("submission should set a cookie")
        .to_str()
        .unwrap();
    header
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("secret="))
        .expect("cookie should be named secret")
        .to_string()
}
