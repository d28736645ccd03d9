//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → consumed once at ServiceRunner / Shutdown construction
//! ```
//!
//! Live-reloadable application state does not go through this module; it is
//! published through `crate::reload` instead.

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::ServiceConfig;
