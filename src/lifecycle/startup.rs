//! Startup orchestration.
//!
//! Subsystems come up in dependency order and any failure aborts startup:
//! metrics, then the ledger (which may need to create its database), then
//! the issuer and downstream, then the listener.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GateConfig;
use crate::http::downstream::Downstream;
use crate::http::error::GateError;
use crate::http::GateServer;
use crate::ledger::{LedgerError, PreimageLedger};
use crate::observability::metrics;
use crate::secrets::SecretIssuer;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to start metrics exporter on {address}: {reason}")]
    Metrics { address: String, reason: String },

    #[error("failed to open preimage ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid downstream: {0}")]
    Downstream(#[from] GateError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bring up every subsystem and bind the listener.
pub async fn start(config: GateConfig) -> Result<(GateServer, TcpListener), StartupError> {
    if config.observability.metrics_enabled {
        let address = &config.observability.metrics_address;
        let addr = address
            .parse::<SocketAddr>()
            .map_err(|e| StartupError::Metrics {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        metrics::init_metrics(addr).map_err(|e| StartupError::Metrics {
            address: address.clone(),
            reason: e.to_string(),
        })?;
    }

    let ledger = PreimageLedger::from_config(&config.ledger)?;
    let issuer = Arc::new(SecretIssuer::from_config(&config.secrets));
    let downstream = Downstream::from_config(&config.downstream)?;

    tracing::info!(
        ledger_path = %config.ledger.path,
        capacity = config.ledger.capacity,
        secret_ttl_secs = config.secrets.ttl_secs,
        secret_policy = ?config.secrets.policy,
        upstream = config.downstream.upstream_url.as_deref().unwrap_or("echo"),
        "Subsystems initialized"
    );

    let bind_address = config.listener.bind_address.clone();
    let server = GateServer::new(config, ledger, issuer, downstream);

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    Ok((server, listener))
}
