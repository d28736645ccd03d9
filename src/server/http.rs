//! HTTP protocol server.
//!
//! Wraps axum. Route registration is deferred to serve time through a setup
//! callback, so application wiring happens only once a listener actually
//! exists; the order servers are registered in is independent of bind order.

use std::future::IntoFuture;
use std::sync::Arc;

use axum::Router;

use crate::lifecycle::Shutdown;
use crate::net::{sniff, Incoming};
use crate::server::{ProtocolServer, ServeError};

/// Serves HTTP/1.1 (and h2c for clients that upgrade) through axum.
pub struct HttpServer {
    setup: Arc<dyn Fn() -> Router + Send + Sync>,
}

impl HttpServer {
    /// `setup` builds the application router; it is invoked once per serve.
    pub fn new<F>(setup: F) -> Self
    where
        F: Fn() -> Router + Send + Sync + 'static,
    {
        Self {
            setup: Arc::new(setup),
        }
    }
}

#[async_trait::async_trait]
impl ProtocolServer for HttpServer {
    fn matches(&self, preface: &[u8]) -> bool {
        sniff::is_http1_request(preface)
    }

    async fn serve(&self, incoming: Incoming, shutdown: Shutdown) -> Result<(), ServeError> {
        let app = (self.setup)();

        let graceful = {
            let mut rx = shutdown.subscribe();
            async move {
                let _ = rx.recv().await;
            }
        };
        let serve = axum::serve(incoming, app.into_make_service())
            .with_graceful_shutdown(graceful)
            .into_future();

        // Fresh deadline, deliberately not derived from the shutdown signal
        // itself: the signal must not be able to abort its own drain.
        let drain_timeout = shutdown.drain_timeout();
        let mut overdue_rx = shutdown.subscribe();
        let drain_overdue = async move {
            let _ = overdue_rx.recv().await;
            tokio::time::sleep(drain_timeout).await;
        };

        tracing::debug!("HTTP server starting");

        tokio::select! {
            result = serve => result.map_err(ServeError::Http)?,
            _ = drain_overdue => {
                tracing::warn!(
                    wait = ?drain_timeout,
                    "HTTP drain exceeded shutdown wait, abandoning remaining connections"
                );
            }
        }

        tracing::debug!("HTTP server stopped");
        Ok(())
    }
}
