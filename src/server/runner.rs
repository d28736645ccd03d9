//! Service runner: bind once, serve one composed server, return when drained.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::lifecycle::Shutdown;
use crate::net::Incoming;
use crate::server::ProtocolServer;

/// Errors surfaced by [`ServiceRunner::run`].
///
/// Bind failures are reported to the caller; what to do about them (exit,
/// retry, alert) is deliberately not decided here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
}

/// Owns exactly one bound listener for its lifetime and delegates everything
/// else to one composed [`ProtocolServer`].
///
/// The lifecycle is bind → serve → (on shutdown) drain → return; there is no
/// re-bind or restart. `run` is the program's final blocking call.
pub struct ServiceRunner {
    bind_address: String,
    server: Arc<dyn ProtocolServer>,
}

impl ServiceRunner {
    pub fn new(bind_address: impl Into<String>, server: Arc<dyn ProtocolServer>) -> Self {
        Self {
            bind_address: bind_address.into(),
            server,
        }
    }

    pub fn from_config(config: &ServiceConfig, server: Arc<dyn ProtocolServer>) -> Self {
        Self::new(config.bind_address.clone(), server)
    }

    /// Bind and serve until `shutdown` has fired and every component joined.
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), RunError> {
        let listener = match TcpListener::bind(&self.bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::warn!(
                    address = %self.bind_address,
                    error = %e,
                    "Failed to bind listener"
                );
                return Err(RunError::Bind {
                    addr: self.bind_address.clone(),
                    source: e,
                });
            }
        };

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Listening for connections");
        }

        // Serve failures were already handled at the protocol-server or
        // multiplexer boundary; here they are terminal but non-fatal.
        if let Err(e) = self
            .server
            .serve(Incoming::Bound(listener), shutdown.clone())
            .await
        {
            tracing::warn!(error = %e, "Server exited with failure");
        }

        // A clean drain leaves no subscriber behind.
        tracing::info!(
            remaining_subscribers = shutdown.receiver_count(),
            "Service runner stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServeError;
    use std::time::Duration;

    struct IdleServer;

    #[async_trait::async_trait]
    impl ProtocolServer for IdleServer {
        fn matches(&self, _preface: &[u8]) -> bool {
            true
        }

        async fn serve(
            &self,
            _incoming: Incoming,
            shutdown: Shutdown,
        ) -> Result<(), ServeError> {
            let mut rx = shutdown.subscribe();
            let _ = rx.recv().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn bind_failure_is_surfaced_not_fatal() {
        // Occupy a port, then ask the runner to bind it again.
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap();

        let runner = ServiceRunner::new(addr.to_string(), Arc::new(IdleServer));
        let result = runner.run(Shutdown::new()).await;
        assert!(matches!(result, Err(RunError::Bind { .. })));
    }

    #[tokio::test]
    async fn run_returns_once_server_has_drained() {
        let runner = ServiceRunner::new("127.0.0.1:0", Arc::new(IdleServer));
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { runner.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("runner did not return after drain")
            .unwrap()
            .unwrap();
    }
}
