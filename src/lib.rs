//! Preimage-gated ingestion service.
//!
//! Clients submit a one-time preimage to `POST /preimages`; if it has never
//! been seen the gate records it and answers with a short-lived secret
//! cookie. Every other request must carry that cookie, and is forwarded
//! downstream only after the secret is checked and stripped.

pub mod config;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod secrets;

pub use config::GateConfig;
pub use http::GateServer;
pub use ledger::PreimageLedger;
pub use lifecycle::Shutdown;
pub use secrets::SecretIssuer;
