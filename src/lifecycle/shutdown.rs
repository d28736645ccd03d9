//! Shutdown coordination for the service runtime.

use std::time::Duration;
use tokio::sync::broadcast;

/// Default drain budget applied to graceful stops.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks subscribe to.
/// A single upstream `trigger` fans out to every subscriber; components never
/// trigger it on behalf of a failing sibling.
///
/// The coordinator also carries the drain budget: once a component has observed
/// the signal and begun its graceful stop, it waits at most `drain_timeout`
/// before abandoning in-flight work. The budget is a fresh deadline, not derived
/// from the signal itself, so cancellation cannot abort its own drain.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
    /// Bounded wait applied to graceful stops.
    drain_timeout: Duration,
}

impl Shutdown {
    /// Create a new shutdown coordinator with the default drain budget.
    pub fn new() -> Self {
        Self::with_drain_timeout(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Create a coordinator with a custom drain budget.
    pub fn with_drain_timeout(drain_timeout: Duration) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx, drain_timeout }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// The bounded wait a component may spend draining after the signal.
    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
