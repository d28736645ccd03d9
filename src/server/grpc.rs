//! gRPC protocol server.
//!
//! Wraps tonic. Service registration is deferred to serve time through a setup
//! callback that receives the transport builder and returns it with every
//! service added.

use std::io;
use std::sync::Arc;

use futures_util::stream::Stream;
use tokio::net::TcpStream;
use tonic::transport::server::Router as GrpcRouter;
use tonic::transport::Server as GrpcBuilder;

use crate::lifecycle::Shutdown;
use crate::net::{sniff, Incoming};
use crate::server::{ProtocolServer, ServeError};

/// Serves gRPC over HTTP/2 through tonic.
pub struct GrpcServer {
    setup: Arc<dyn Fn(GrpcBuilder) -> GrpcRouter + Send + Sync>,
}

impl GrpcServer {
    /// `setup` receives a fresh transport builder and must register at least
    /// one service; it is invoked once per serve.
    pub fn new<F>(setup: F) -> Self
    where
        F: Fn(GrpcBuilder) -> GrpcRouter + Send + Sync + 'static,
    {
        Self {
            setup: Arc::new(setup),
        }
    }
}

/// Adapt an [`Incoming`] into the connection stream tonic consumes.
///
/// The stream ends when a derived feed is closed by the demux engine.
fn connection_stream(incoming: Incoming) -> impl Stream<Item = io::Result<TcpStream>> {
    futures_util::stream::unfold(incoming, |mut incoming| async move {
        match incoming.next_connection().await {
            Ok(Some((stream, _peer))) => Some((Ok(stream), incoming)),
            Ok(None) => None,
            Err(e) => Some((Err(e), incoming)),
        }
    })
}

#[async_trait::async_trait]
impl ProtocolServer for GrpcServer {
    /// gRPC runs exclusively over HTTP/2, so the predicate keys on the HTTP/2
    /// client connection preface.
    fn matches(&self, preface: &[u8]) -> bool {
        sniff::is_http2_preface(preface)
    }

    async fn serve(&self, incoming: Incoming, shutdown: Shutdown) -> Result<(), ServeError> {
        let router = (self.setup)(GrpcBuilder::builder());

        let graceful = {
            let mut rx = shutdown.subscribe();
            async move {
                let _ = rx.recv().await;
            }
        };
        let serve = router.serve_with_incoming_shutdown(connection_stream(incoming), graceful);

        // Same non-propagating drain deadline as the HTTP variant.
        let drain_timeout = shutdown.drain_timeout();
        let mut overdue_rx = shutdown.subscribe();
        let drain_overdue = async move {
            let _ = overdue_rx.recv().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tracing::debug!("gRPC server starting");

        tokio::select! {
            result = serve => result.map_err(ServeError::Grpc)?,
            _ = drain_overdue => {
                tracing::warn!(
                    wait = ?drain_timeout,
                    "gRPC drain exceeded shutdown wait, abandoning remaining connections"
                );
            }
        }

        tracing::debug!("gRPC server stopped");
        Ok(())
    }
}
