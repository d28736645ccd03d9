//! Hot-reloadable shared state.
//!
//! # Responsibilities
//! - Publish immutable snapshots to an unbounded number of readers without locks
//! - Run exactly one background writer per cell, fed by an update channel
//! - Enforce the first-snapshot deadline at construction
//!
//! # Design Decisions
//! - `arc_swap::ArcSwap` carries the current snapshot; a read is a single
//!   atomic pointer load and a superseded snapshot is freed only when its last
//!   `Arc` holder drops it
//! - The update channel is bounded (capacity 4) and the producer's send awaits
//!   delivery; the writer only performs an atomic store, so the producer is
//!   never meaningfully blocked and no update is ever dropped
//! - A `None` update is a defined no-op signal ("nothing new"), not an error

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod poller;

pub use poller::{FetchError, Poller};

/// One delivery on a cell's update channel. `None` means "nothing new".
pub type Update<T> = Option<Arc<T>>;

/// Sending half of a cell's update channel, handed to the producer.
pub type UpdateSender<T> = mpsc::Sender<Update<T>>;

const UPDATE_CHANNEL_CAPACITY: usize = 4;

/// Errors surfaced at cell construction. After construction nothing fails:
/// delivery problems are the producer's to log and recover.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// The producer delivered no snapshot within the init deadline.
    #[error("no snapshot delivered within {0:?}")]
    InitTimeout(Duration),

    /// The producer stopped before delivering its first snapshot.
    #[error("producer stopped before delivering a snapshot")]
    ProducerExited,
}

/// A lock-free, hot-swappable holder for an immutable snapshot of `T`.
///
/// Cloning the handle is cheap; all clones observe the same cell. There is no
/// explicit destruction: the cell and its writer task are process-scoped and
/// wind down when the producer drops its sender.
pub struct Reloadable<T> {
    current: Arc<ArcSwap<T>>,
}

impl<T> Clone for Reloadable<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: Send + Sync + 'static> Reloadable<T> {
    /// Construct a cell driven by an arbitrary background producer.
    ///
    /// The producer is spawned immediately and handed the sending half of the
    /// update channel. It must deliver at least one `Some(snapshot)` within
    /// `init_timeout`, otherwise construction fails and the producer task is
    /// aborted so nothing lingers. After the first delivery the producer runs
    /// for as long as it keeps its sender alive.
    pub async fn with_producer<F, Fut>(
        init_timeout: Duration,
        producer: F,
    ) -> Result<Self, ReloadError>
    where
        F: FnOnce(UpdateSender<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let producer_task = tokio::spawn(producer(tx));

        let first = tokio::time::timeout(init_timeout, async {
            loop {
                match rx.recv().await {
                    Some(Some(snapshot)) => break Some(snapshot),
                    // "Nothing new" before anything was published; keep waiting.
                    Some(None) => continue,
                    None => break None,
                }
            }
        })
        .await;

        let first = match first {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                producer_task.abort();
                return Err(ReloadError::ProducerExited);
            }
            Err(_) => {
                producer_task.abort();
                return Err(ReloadError::InitTimeout(init_timeout));
            }
        };

        let current = Arc::new(ArcSwap::new(first));

        // The single writer. Ends when the producer drops its sender.
        let writer_cell = Arc::clone(&current);
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if let Some(snapshot) = update {
                    writer_cell.store(snapshot);
                    tracing::debug!("Snapshot published");
                }
            }
        });

        Ok(Self { current })
    }

    /// Construct a cell driven by a [`Poller`].
    ///
    /// The poller's own `init_timeout` bounds the first fetch; a failed first
    /// fetch aborts construction.
    pub async fn with_poller<P>(poller: P) -> Result<Self, ReloadError>
    where
        P: Poller<Snapshot = T>,
    {
        let init_timeout = poller.init_timeout();
        Self::with_producer(init_timeout, move |tx| poller::run(poller, tx)).await
    }

    /// The current snapshot. Non-blocking, never fails, and always returns a
    /// fully-published value.
    pub fn get(&self) -> Arc<T> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publishes_initial_and_subsequent_snapshots() {
        let cell = Reloadable::with_producer(Duration::from_millis(200), |tx| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(Some(Arc::new(1u64))).await.unwrap();
            tx.send(Some(Arc::new(2u64))).await.unwrap();
        })
        .await
        .unwrap();

        // The channel is ordered, so by the time 2 is observable nothing else
        // can ever be republished.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        loop {
            let current = *cell.get();
            assert!(current == 1 || current == 2);
            if current == 2 {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "never saw snapshot 2");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn init_timeout_fails_construction_and_reaps_producer() {
        let marker = Arc::new(());
        let held = Arc::clone(&marker);

        let result = Reloadable::<u64>::with_producer(Duration::from_millis(200), |tx| {
            async move {
                let _held = held;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                let _ = tx.send(Some(Arc::new(1))).await;
            }
        })
        .await;

        assert!(matches!(result, Err(ReloadError::InitTimeout(_))));

        // The aborted producer must release everything it captured.
        for _ in 0..50 {
            if Arc::strong_count(&marker) == 1 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("producer task still alive after init timeout");
    }

    #[tokio::test]
    async fn producer_exit_without_snapshot_is_an_error() {
        let result =
            Reloadable::<u64>::with_producer(Duration::from_secs(5), |tx| async move {
                tx.send(None).await.unwrap();
                // Sender dropped here without ever publishing.
            })
            .await;

        assert!(matches!(result, Err(ReloadError::ProducerExited)));
    }

    #[tokio::test]
    async fn none_updates_are_ignored() {
        let cell = Reloadable::with_producer(Duration::from_secs(1), |tx| async move {
            tx.send(Some(Arc::new(7u64))).await.unwrap();
            tx.send(None).await.unwrap();
            tx.send(None).await.unwrap();
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*cell.get(), 7);
    }

    #[tokio::test]
    async fn clones_observe_the_same_cell() {
        let cell = Reloadable::with_producer(Duration::from_secs(1), |tx| async move {
            tx.send(Some(Arc::new(String::from("a")))).await.unwrap();
        })
        .await
        .unwrap();

        let clone = cell.clone();
        assert_eq!(*clone.get(), "a");
    }
}
