//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → handed to each component at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AccessConfig, DownstreamConfig, GateConfig, LedgerConfig, ListenerConfig,
    ObservabilityConfig, SecretPolicy, SecretsConfig, SecurityConfig, TimeoutConfig,
    MAX_PREIMAGES,
};
pub use validation::{validate_config, ValidationError};
