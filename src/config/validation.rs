//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (overall timeout > 0, addresses parse)
//! - Measure the graceful budget so the loader can warn when it reaches the
//!   overall deadline
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::{AppConfig, ShutdownConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("shutdown.timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("shutdown.signals must name at least one signal")]
    NoSignals,

    #[error("server #{index} has an empty name")]
    EmptyServerName { index: usize },

    #[error("server '{name}' has invalid bind address '{address}'")]
    InvalidBindAddress { name: String, address: String },

    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let shutdown = &config.shutdown;

    if shutdown.timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }

    if shutdown.signals.is_empty() {
        errors.push(ValidationError::NoSignals);
    }

    for (index, server) in config.servers.iter().enumerate() {
        if server.name.trim().is_empty() {
            errors.push(ValidationError::EmptyServerName { index });
        }
        if server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidBindAddress {
                name: server.name.clone(),
                address: server.bind_address.clone(),
            });
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Time the drain, callback and release phases take on their own, server
/// stops not included.
pub fn graceful_budget(shutdown: &ShutdownConfig) -> Duration {
    shutdown
        .drain_wait()
        .saturating_add(shutdown.callback_timeout())
        .saturating_add(shutdown.release_pause())
}
