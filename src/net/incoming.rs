//! Listener abstraction shared by all protocol servers.
//!
//! A protocol server accepts connections either straight off a bound socket or
//! from a feed of pre-classified connections handed over by the demultiplexing
//! engine. `Incoming` unifies the two so a server's serve loop never knows
//! which side of the engine it is on.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// Source of inbound connections for one protocol server.
pub enum Incoming {
    /// The raw bound socket; used when no demultiplexing is in play.
    Bound(TcpListener),
    /// A derived listener fed by the engine with connections that matched
    /// this server's predicate. The feed ends when the engine shuts down.
    Routed {
        /// Address of the underlying shared socket, for logging and handlers.
        local_addr: SocketAddr,
        /// Classified connections, ownership transferred exclusively.
        rx: mpsc::Receiver<(TcpStream, SocketAddr)>,
    },
}

impl Incoming {
    /// Accept the next connection.
    ///
    /// `Ok(None)` means the source is exhausted: a derived feed was closed by
    /// the engine. A bound socket never reports exhaustion.
    pub async fn next_connection(&mut self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match self {
            Incoming::Bound(listener) => listener.accept().await.map(Some),
            Incoming::Routed { rx, .. } => Ok(rx.recv().await),
        }
    }

    /// The local address connections arrive on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        match self {
            Incoming::Bound(listener) => listener.local_addr(),
            Incoming::Routed { local_addr, .. } => Ok(*local_addr),
        }
    }
}

impl axum::serve::Listener for Incoming {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.next_connection().await {
                Ok(Some(conn)) => return conn,
                // Feed closed: park until graceful shutdown completes the
                // serve future.
                Ok(None) => std::future::pending().await,
                Err(e) => {
                    tracing::debug!(error = %e, "Accept failed, retrying");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Incoming::local_addr(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routed_feed_yields_then_ends() {
        let local_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let (tx, rx) = mpsc::channel(4);
        let mut incoming = Incoming::Routed { local_addr, rx };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server_side, peer) = listener.accept().await.unwrap();

        tx.send((server_side, peer)).await.unwrap();
        drop(tx);

        assert!(incoming.next_connection().await.unwrap().is_some());
        assert!(incoming.next_connection().await.unwrap().is_none());
        assert_eq!(incoming.local_addr().unwrap(), local_addr);
        drop(client);
    }

    #[tokio::test]
    async fn bound_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut incoming = Incoming::Bound(listener);

        let _client = TcpStream::connect(addr).await.unwrap();
        let accepted = incoming.next_connection().await.unwrap();
        assert!(accepted.is_some());
    }
}
