//! Network primitives for multi-protocol serving.
//!
//! # Responsibilities
//! - Unified listener abstraction (`Incoming`) for bound and derived listeners
//! - Connection preface sniffing without consuming bytes (sniff.rs)

pub mod incoming;
pub mod sniff;

pub use incoming::Incoming;
