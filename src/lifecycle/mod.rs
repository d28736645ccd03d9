//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Compose protocol servers → ServiceRunner binds → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight → Join components
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One coordinator per process; every component derives from the same signal
//! - Drain is bounded by a non-propagating budget carried on the coordinator
//! - Nothing in this crate calls process-exit; termination policy is the caller's

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
