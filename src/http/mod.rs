//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, request span)
//!     → middleware/gate.rs (exempt | 403 | scrub + forward)
//!     → preimages.rs (submission path) | downstream.rs (everything else)
//!     → error.rs (status + JSON detail on failure)
//! ```

pub mod downstream;
pub mod error;
pub mod middleware;
pub mod preimages;
pub mod request;
pub mod server;

pub use downstream::{Downstream, Upstream};
pub use error::GateError;
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, GateServer};
