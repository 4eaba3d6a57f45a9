//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: submission endpoint plus downstream routes
//! - Wrap every route in the authorization gate
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Serve on a listener until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::post, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::downstream::Downstream;
use crate::http::error::json_error_body;
use crate::http::middleware::{authorization_gate, GateState};
use crate::http::preimages::submit_preimage;
use crate::http::request::{make_span, MakeRequestUuidV4};
use crate::ledger::PreimageLedger;
use crate::secrets::SecretIssuer;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: PreimageLedger,
    pub issuer: Arc<SecretIssuer>,
    pub config: Arc<GateConfig>,
}

/// HTTP server for the gate.
pub struct GateServer {
    router: Router,
    config: Arc<GateConfig>,
}

impl GateServer {
    /// Assemble the server from already-built components.
    ///
    /// The downstream only sees requests the submission route does not
    /// match, so it can never take over the submission path.
    pub fn new(
        config: GateConfig,
        ledger: PreimageLedger,
        issuer: Arc<SecretIssuer>,
        downstream: Downstream,
    ) -> Self {
        let config = Arc::new(config);
        let gate = GateState::new(&config, issuer.clone());
        let state = AppState {
            ledger,
            issuer,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state, gate, downstream);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost first: request ID, trace, JSON error bodies,
    /// timeout, body limit, then the gate, so nothing reaches a handler
    /// without passing the gate.
    #[allow(deprecated)]
    fn build_router(
        config: &GateConfig,
        state: AppState,
        gate: GateState,
        downstream: Downstream,
    ) -> Router {
        Router::new()
            .route(&config.gate.submission_path, post(submit_preimage))
            .with_state(state)
            .fallback_service(downstream.into_router())
            .layer(middleware::from_fn_with_state(gate, authorization_gate))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::map_response(json_error_body))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            submission_path = %self.config.gate.submission_path,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
