//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the process.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lifecycle::signals::{TerminationSignal, DEFAULT_SIGNALS};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Shutdown timings and recognised signals.
    pub shutdown: ShutdownConfig,

    /// Servers hosted by this process, in start order.
    pub servers: Vec<ServerConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Shutdown sequence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Overall deadline for the whole sequence before a forced exit.
    pub timeout_secs: u64,

    /// Grace period for already-admitted requests before servers stop.
    pub drain_secs: u64,

    /// Advisory deadline handed to each cleanup callback.
    pub callback_timeout_secs: u64,

    /// Pause taken in the final resource release phase.
    pub release_pause_ms: u64,

    /// Signals that start (and, when repeated, force) the shutdown.
    pub signals: Vec<TerminationSignal>,
}

impl ShutdownConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn drain_wait(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn release_pause(&self) -> Duration {
        Duration::from_millis(self.release_pause_ms)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            drain_secs: 10,
            callback_timeout_secs: 3,
            release_pause_ms: 1000,
            signals: DEFAULT_SIGNALS.to_vec(),
        }
    }
}

/// A single hosted server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Name used in logs and metric labels.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Upper bound on the listener's own graceful stop. Unbounded when absent.
    #[serde(default)]
    pub grace_limit_secs: Option<u64>,
}

impl ServerConfig {
    pub fn grace_limit(&self) -> Option<Duration> {
        self.grace_limit_secs.map(Duration::from_secs)
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
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
