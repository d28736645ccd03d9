//! Connection multiplexer: N protocol servers sharing one listening socket.
//!
//! # Responsibilities
//! - Sniff each new connection's preface and route it to the first matching
//!   sub-server, in registration order
//! - Run every sub-server concurrently over its derived listener
//! - Join all components on shutdown and aggregate their results
//!
//! # Design Decisions
//! - A single registered server bypasses sniffing entirely and receives the
//!   raw listener
//! - A connection matching no predicate is closed immediately (logged); a
//!   deployment that wants a fallback registers an explicit catch-all last
//! - Sub-server failures are aggregated and logged, never returned: once every
//!   component has drained, the overall serve reports success

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::lifecycle::Shutdown;
use crate::net::{sniff, Incoming};
use crate::server::{ProtocolServer, ServeError};

const DEFAULT_SNIFF_TIMEOUT: Duration = Duration::from_secs(10);

/// Backlog of classified connections queued per sub-server.
const ROUTE_QUEUE_CAPACITY: usize = 64;

/// A [`ProtocolServer`] composed of an ordered list of sub-servers sharing one
/// socket. Order is significant: it defines match priority, first match wins.
/// Being a `ProtocolServer` itself (with a catch-all predicate), mixed servers
/// nest.
pub struct MixedServer {
    servers: Vec<Arc<dyn ProtocolServer>>,
    sniff_timeout: Duration,
}

impl MixedServer {
    pub fn new(servers: Vec<Arc<dyn ProtocolServer>>) -> Self {
        Self {
            servers,
            sniff_timeout: DEFAULT_SNIFF_TIMEOUT,
        }
    }

    /// Bound the time a connection may take to reveal a decisive preface.
    pub fn with_sniff_timeout(mut self, sniff_timeout: Duration) -> Self {
        self.sniff_timeout = sniff_timeout;
        self
    }

    /// Run the demux engine and every sub-server; returns one result per
    /// sub-server in registration order, with the engine's own result last.
    async fn run_engine(
        &self,
        mut incoming: Incoming,
        shutdown: Shutdown,
    ) -> Vec<Result<(), ServeError>> {
        let local_addr = incoming
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));

        // Sub-servers stop on a signal derived from the upstream one, so that
        // an engine failure also winds down the derived listeners (whose feed
        // is dead either way). A sub-server failure still cannot touch its
        // siblings: nothing but the engine triggers this.
        let mux_shutdown = Shutdown::with_drain_timeout(shutdown.drain_timeout());
        let relay = {
            let mut upstream = shutdown.subscribe();
            let mux_shutdown = mux_shutdown.clone();
            tokio::spawn(async move {
                let _ = upstream.recv().await;
                mux_shutdown.trigger();
            })
        };

        // One derived listener per sub-server.
        let mut handles: Vec<JoinHandle<Result<(), ServeError>>> =
            Vec::with_capacity(self.servers.len());
        let mut routes = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            let (tx, rx) = mpsc::channel(ROUTE_QUEUE_CAPACITY);
            routes.push(tx);
            let server = Arc::clone(server);
            let shutdown = mux_shutdown.clone();
            handles.push(tokio::spawn(async move {
                server.serve(Incoming::Routed { local_addr, rx }, shutdown).await
            }));
        }
        let routes = Arc::new(routes);

        let matchers: Arc<Vec<Arc<dyn ProtocolServer>>> = Arc::new(self.servers.clone());
        let mut sniffers = JoinSet::new();
        let mut stop_rx = shutdown.subscribe();

        let engine_result = loop {
            tokio::select! {
                _ = stop_rx.recv() => break Ok(()),
                accepted = incoming.next_connection() => match accepted {
                    Ok(Some((stream, peer))) => {
                        let matchers = Arc::clone(&matchers);
                        let routes = Arc::clone(&routes);
                        let sniff_timeout = self.sniff_timeout;
                        sniffers.spawn(dispatch_connection(
                            matchers,
                            routes,
                            stream,
                            peer,
                            sniff_timeout,
                        ));
                    }
                    // Upstream feed ended (a parent multiplexer shut down).
                    Ok(None) => break Ok(()),
                    Err(e) if is_transient_accept_error(&e) => {
                        tracing::debug!(error = %e, "Transient accept error");
                    }
                    Err(e) => break Err(ServeError::Accept(e)),
                },
                // Reap finished sniff tasks so the set stays small.
                Some(_) = sniffers.join_next(), if !sniffers.is_empty() => {}
            }
        };

        // Stop accepting, then drop connections still being classified; the
        // sub-servers drain their own in-flight work independently.
        drop(incoming);
        sniffers.shutdown().await;
        drop(routes);
        mux_shutdown.trigger();

        let mut results = Vec::with_capacity(handles.len() + 1);
        for handle in handles {
            results.push(
                handle
                    .await
                    .unwrap_or_else(|e| Err(ServeError::Join(e.to_string()))),
            );
        }
        // The derived coordinator already fired; the relay has nothing left
        // to trigger and must not outlive the engine.
        relay.abort();
        results.push(engine_result);
        results
    }
}

impl Clone for MixedServer {
    fn clone(&self) -> Self {
        Self {
            servers: self.servers.clone(),
            sniff_timeout: self.sniff_timeout,
        }
    }
}

#[async_trait::async_trait]
impl ProtocolServer for MixedServer {
    /// Catch-all: a nested mixed server claims whatever reaches it.
    fn matches(&self, _preface: &[u8]) -> bool {
        true
    }

    async fn serve(&self, incoming: Incoming, shutdown: Shutdown) -> Result<(), ServeError> {
        match self.servers.len() {
            0 => Err(ServeError::EmptyServerList),
            // Single server: no sniffing, hand over the raw listener.
            1 => self.servers[0].serve(incoming, shutdown).await,
            _ => {
                let results = self.run_engine(incoming, shutdown).await;

                let rendered: Vec<String> = results
                    .iter()
                    .map(|r| match r {
                        Ok(()) => "ok".to_string(),
                        Err(e) => e.to_string(),
                    })
                    .collect();
                if results.iter().any(|r| r.is_err()) {
                    tracing::warn!(results = ?rendered, "Mixed server drained with failures");
                } else {
                    tracing::debug!(results = ?rendered, "Mixed server drained cleanly");
                }

                // Partial failures were logged above; "all drained" is success.
                Ok(())
            }
        }
    }
}

/// Errors `accept(2)` reports about the connection rather than the listener.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Classify one connection and hand it to the first matching sub-server.
///
/// Dropping the stream on any non-routed path closes the connection.
async fn dispatch_connection(
    matchers: Arc<Vec<Arc<dyn ProtocolServer>>>,
    routes: Arc<Vec<mpsc::Sender<(TcpStream, SocketAddr)>>>,
    stream: TcpStream,
    peer: SocketAddr,
    sniff_timeout: Duration,
) {
    let preface = match tokio::time::timeout(sniff_timeout, sniff::peek_preface(&stream)).await {
        Ok(Ok(Some(preface))) => preface,
        Ok(Ok(None)) => {
            tracing::debug!(peer = %peer, "Connection closed during protocol sniff");
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(peer = %peer, error = %e, "Protocol sniff failed");
            return;
        }
        Err(_) => {
            tracing::debug!(peer = %peer, "Protocol sniff timed out, closing");
            return;
        }
    };

    match matchers.iter().position(|s| s.matches(&preface)) {
        Some(index) => {
            // Receiver gone means that sub-server already stopped; the
            // connection is dropped with it.
            if routes[index].send((stream, peer)).await.is_err() {
                tracing::debug!(peer = %peer, index, "Matched server no longer accepting");
            }
        }
        None => {
            tracing::warn!(peer = %peer, "Connection matched no registered protocol, closing");
        }
    }
}
