//! Observability subsystem: subscriber setup for structured logging.

pub mod logging;
