//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that parse but cannot
//! work: zero capacities, malformed paths, unparseable addresses.
//! All errors are collected and returned together.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GateConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: path {value:?} must start with '/'")]
    InvalidPath { field: &'static str, value: String },

    #[error("downstream.path must differ from gate.submission_path ({0:?})")]
    PathCollision(String),

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("downstream.upstream_url: {0}")]
    InvalidUpstream(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.ledger.capacity == 0 {
        errors.push(ValidationError::Zero { field: "ledger.capacity" });
    }
    if config.ledger.max_preimage_bytes == 0 {
        errors.push(ValidationError::Zero { field: "ledger.max_preimage_bytes" });
    }
    if config.ledger.path.is_empty() {
        errors.push(ValidationError::Empty { field: "ledger.path" });
    }
    if config.secrets.ttl_secs == 0 {
        errors.push(ValidationError::Zero { field: "secrets.ttl_secs" });
    }
    if config.secrets.cookie_name.is_empty() {
        errors.push(ValidationError::Empty { field: "secrets.cookie_name" });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero { field: "security.max_body_size" });
    }

    check_path(&mut errors, "gate.submission_path", &config.gate.submission_path);
    check_path(&mut errors, "downstream.path", &config.downstream.path);
    if config.gate.submission_path == config.downstream.path {
        errors.push(ValidationError::PathCollision(config.downstream.path.clone()));
    }

    if let Some(upstream) = &config.downstream.upstream_url {
        match url::Url::parse(upstream) {
            Ok(parsed) if parsed.scheme() != "http" => {
                errors.push(ValidationError::InvalidUpstream(format!(
                    "unsupported scheme {:?}",
                    parsed.scheme()
                )));
            }
            Ok(parsed) if parsed.host_str().is_none() => {
                errors.push(ValidationError::InvalidUpstream("missing host".to_string()));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidUpstream(e.to_string())),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_path(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}
