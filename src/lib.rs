//! polyserve: reloadable state and a multi-protocol service runtime.
//!
//! Two building blocks for thin service scaffolds:
//!
//! - [`Reloadable`]: a lock-free, hot-swappable cell publishing immutable
//!   snapshots to any number of readers, fed by a single background producer
//!   (optionally a version-gated [`Poller`]).
//! - A server runtime that shares one listening socket among heterogeneous
//!   protocol servers: [`MixedServer`] sniffs each connection's leading bytes
//!   and routes it to the first matching [`ProtocolServer`] ([`HttpServer`],
//!   [`GrpcServer`], or a nested mix), with coordinated startup and
//!   cancellation-driven graceful shutdown via [`Shutdown`], all driven by a
//!   single [`ServiceRunner::run`] call.

// Core subsystems
pub mod config;
pub mod net;
pub mod reload;
pub mod server;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use lifecycle::Shutdown;
pub use reload::{Poller, Reloadable};
pub use server::{
    GrpcServer, HttpServer, MixedServer, ProtocolServer, RunError, ServeError, ServiceRunner,
};
