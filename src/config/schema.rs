//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Capacity of the preimage ledger when none is configured.
pub const MAX_PREIMAGES: usize = 999_999;

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Preimage ledger storage and bounds.
    pub ledger: LedgerConfig,

    /// Secret issuance and cookie settings.
    pub secrets: SecretsConfig,

    /// Authorization gate behavior.
    pub gate: AccessConfig,

    /// Where authorized requests go.
    pub downstream: DownstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Preimage ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database file. `:memory:` keeps the ledger in process memory.
    pub path: String,

    /// Maximum number of preimages retained before oldest-first eviction.
    pub capacity: usize,

    /// Longest accepted preimage, in bytes.
    pub max_preimage_bytes: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "preim.db".to_string(),
            capacity: MAX_PREIMAGES,
            max_preimage_bytes: 1024,
        }
    }
}

/// How long an issued secret stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretPolicy {
    /// A secret authorizes exactly one request.
    #[default]
    SingleUse,
    /// A secret authorizes any number of requests until its TTL elapses.
    Session,
}

/// Secret issuance configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Cookie carrying the secret.
    pub cookie_name: String,

    /// Secret time-to-live in seconds (also the cookie Max-Age).
    pub ttl_secs: u64,

    /// Single-use or session-lived secrets.
    pub policy: SecretPolicy,

    /// Add the `Secure` attribute to the cookie.
    pub secure_cookie: bool,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            cookie_name: "secret".to_string(),
            ttl_secs: 3600,
            policy: SecretPolicy::SingleUse,
            secure_cookie: false,
        }
    }
}

/// Authorization gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Path exempt from the secret check; preimages are submitted here.
    pub submission_path: String,

    /// Top-level JSON field removed from authorized request bodies.
    pub strip_field: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            submission_path: "/preimages".to_string(),
            strip_field: "secret".to_string(),
        }
    }
}

/// Downstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Path served by the built-in echo handler when no upstream is set.
    pub path: String,

    /// Upstream base URL (e.g., "http://127.0.0.1:8000") that receives
    /// authorized requests.
    pub upstream_url: Option<String>,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            path: "/chat".to_string(),
            upstream_url: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
