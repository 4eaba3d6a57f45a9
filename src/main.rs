//! Preimage gate (v0.1)
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 PREIMAGE GATE                │
//!   POST /preimages      │  ┌──────────────┐     ┌──────────────────┐   │
//!   ─────────────────────┼─▶│ authorization│────▶│ PreimageLedger   │   │
//!                        │  │     gate     │     │ + SecretIssuer   │───┼──▶ Set-Cookie
//!   any other path       │  │  (exempt /   │     └──────────────────┘   │
//!   + secret cookie      │  │   403 /      │     ┌──────────────────┐   │
//!   ─────────────────────┼─▶│   scrub)     │────▶│   downstream     │───┼──▶ Upstream
//!                        │  └──────────────┘     └──────────────────┘   │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use preimage_gate::config::load_or_default;
use preimage_gate::lifecycle::{self, signals, Shutdown};
use preimage_gate::observability::logging;

#[derive(Parser)]
#[command(name = "preimage-gate")]
#[command(about = "Replay-protected, secret-gated ingestion gate", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "preimage-gate starting");

    let (server, listener) = lifecycle::start(config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_shutdown().await;
        trigger.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
