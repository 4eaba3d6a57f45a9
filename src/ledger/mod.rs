//! Preimage ledger subsystem.
//!
//! # Data Flow
//! ```text
//! POST /preimages
//!     → Preimage::parse (bounds check)
//!     → PreimageLedger::submit
//!         ├── duplicate      → AlreadyExists (nothing written)
//!         ├── at capacity    → delete oldest by sequence, then insert
//!         └── otherwise      → insert with next sequence
//!     → Admission { sequence, evicted }
//! ```
//!
//! # Design Decisions
//! - SQLite file store so the dedup set survives restarts
//! - One long-lived connection behind a mutex; every submission is a single
//!   IMMEDIATE transaction
//! - `AUTOINCREMENT` keys are never reused, so they double as the FIFO order
//! - Eviction happens only on insert; nothing expires on a timer

pub mod store;

use thiserror::Error;

pub use crate::config::schema::MAX_PREIMAGES;
pub use store::PreimageLedger;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The preimage was accepted before and is still retained.
    #[error("Preimage already exists")]
    AlreadyExists,

    /// The submitted value is outside the accepted bounds.
    #[error("Invalid preimage: {0}")]
    InvalidPreimage(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A previous holder of the connection panicked.
    #[error("Storage error: ledger connection poisoned")]
    Poisoned,

    /// The blocking storage task could not complete.
    #[error("Storage error: {0}")]
    Task(String),
}

impl LedgerError {
    /// Whether the failure lies with the store rather than the caller's input.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage(_) | LedgerError::Poisoned | LedgerError::Task(_)
        )
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A caller-supplied preimage that passed the size bounds.
///
/// Identity is exact byte equality; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Preimage(String);

impl Preimage {
    /// Accept `value` if it is non-empty and at most `max_bytes` long.
    pub fn parse(value: impl Into<String>, max_bytes: usize) -> LedgerResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(LedgerError::InvalidPreimage("preimage must not be empty".into()));
        }
        if value.len() > max_bytes {
            return Err(LedgerError::InvalidPreimage(format!(
                "preimage is {} bytes, limit is {}",
                value.len(),
                max_bytes
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for Preimage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Insertion sequence number assigned to the preimage.
    pub sequence: i64,
    /// Records removed to stay within capacity.
    pub evicted: usize,
}

/// A stored preimage with its insertion sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub sequence: i64,
    pub preimage: String,
}
