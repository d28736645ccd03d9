//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServiceConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Semantic validation; serde already handled the syntactic part.
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!("invalid bind_address: {}", config.bind_address));
    }
    if config.sniff_timeout_secs == 0 {
        errors.push("sniff_timeout_secs must be non-zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
