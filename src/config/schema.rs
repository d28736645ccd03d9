//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so a minimal (or absent) file works.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Bounded wait for graceful drain after the shutdown signal, in seconds.
    pub shutdown_wait_secs: u64,

    /// Bounded wait for a connection to reveal its protocol, in seconds.
    pub sniff_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            shutdown_wait_secs: 30,
            sniff_timeout_secs: 10,
        }
    }
}

impl ServiceConfig {
    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_secs(self.shutdown_wait_secs)
    }

    pub fn sniff_timeout(&self) -> Duration {
        Duration::from_secs(self.sniff_timeout_secs)
    }
}
