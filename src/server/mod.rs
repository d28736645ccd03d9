//! Multi-protocol server runtime.
//!
//! # Data Flow
//! ```text
//! ServiceRunner (runner.rs)
//!     binds one TCP socket
//!     → composed ProtocolServer
//!         MixedServer (mixed.rs): sniffs each connection's preface and routes
//!             it to the first matching sub-server, registration order first
//!         HttpServer (http.rs):  HTTP/1.1 + h2c via axum
//!         GrpcServer (grpc.rs):  gRPC via tonic
//!     → all components watch one Shutdown signal and join on drain
//! ```
//!
//! # Design Decisions
//! - The protocol set is open: `ProtocolServer` is a trait, `MixedServer` is
//!   itself a variant so server lists nest
//! - Match predicates are evaluated strictly in registration order; predicates
//!   must be stable for a given preface
//! - A sub-server failure is logged and aggregated, never propagated to
//!   siblings or to the top-level serve result

use async_trait::async_trait;
use thiserror::Error;

use crate::lifecycle::Shutdown;
use crate::net::Incoming;

pub mod grpc;
pub mod http;
pub mod mixed;
pub mod runner;

pub use grpc::GrpcServer;
pub use http::HttpServer;
pub use mixed::MixedServer;
pub use runner::{RunError, ServiceRunner};

/// Errors from a protocol server's serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    /// A mixed server was configured with zero sub-servers.
    #[error("no protocol servers registered")]
    EmptyServerList,

    /// The accept loop failed for a non-shutdown reason.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The HTTP serve loop failed for a non-shutdown reason.
    #[error("http server failed: {0}")]
    Http(#[source] std::io::Error),

    /// The gRPC serve loop failed for a non-shutdown reason.
    #[error("grpc server failed: {0}")]
    Grpc(#[source] tonic::transport::Error),

    /// A sub-server task panicked or was cancelled.
    #[error("server task failed: {0}")]
    Join(String),
}

/// One network protocol served over a shared listening socket.
///
/// Implementations are matched against a connection's sniffed preface and,
/// once claimed, own the connection exclusively. `serve` blocks until the
/// shared shutdown signal has been observed and the graceful stop finished.
#[async_trait]
pub trait ProtocolServer: Send + Sync + 'static {
    /// Does a connection opening with `preface` belong to this server?
    ///
    /// Called with at least [`crate::net::sniff::MIN_DECISIVE_LEN`] bytes.
    /// A predicate that always returns `true` is reserved for an explicit
    /// trailing catch-all.
    fn matches(&self, preface: &[u8]) -> bool;

    /// Serve connections from `incoming` until `shutdown` fires and the drain
    /// completes. A shutdown-triggered clean exit is `Ok(())`.
    async fn serve(&self, incoming: Incoming, shutdown: Shutdown) -> Result<(), ServeError>;
}
