//! Secret issuance subsystem.
//!
//! # Data Flow
//! ```text
//! accepted preimage
//!     → SecretIssuer::issue (128 random bits, hex)
//!     → cookie::set_cookie (Set-Cookie header)
//!
//! protected request
//!     → cookie::find (Cookie header)
//!     → SecretIssuer::redeem (validate, consume under single-use policy)
//! ```
//!
//! # Design Decisions
//! - One issuer per process, shared by `Arc`, owning the valid-token set
//! - Expiry is lazy: tokens are checked and purged on access, no timer
//! - `DashMap::remove` is the atomic validate-and-consume step

pub mod cookie;
pub mod issuer;

use thiserror::Error;

pub use issuer::{SecretIssuer, SecretToken};

/// Why a presented secret was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SecretError {
    /// Never issued, already consumed, or purged after expiry.
    #[error("Invalid secret")]
    Unknown,

    /// Issued but past its time-to-live.
    #[error("Invalid secret")]
    Expired,
}
