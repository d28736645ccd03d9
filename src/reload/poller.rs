//! Poll-driven snapshot production.
//!
//! A poller periodically decides whether fresher state is needed before paying
//! for a fetch. The loop is strictly sequential: ticking and fetching share it,
//! so at most one fetch is ever in flight and a slow fetch delays the next
//! tick. Overlapping fetches would reorder publications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::reload::UpdateSender;

/// Error type produced by a poller's fetch. Fetch failures are recovered
/// locally (logged and retried), so an opaque boxed error suffices.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// A periodic producer of versioned snapshots.
///
/// `Version` is an opaque token; its ordering/equality semantics belong to the
/// implementer, the loop only hands it back to `is_outdated`.
#[async_trait]
pub trait Poller: Send + Sync + 'static {
    type Snapshot: Send + Sync + 'static;
    type Version: Send + 'static;

    /// Deadline for the first successful fetch.
    fn init_timeout(&self) -> Duration;

    /// Fixed period between outdatedness checks.
    fn interval(&self) -> Duration;

    /// Fixed pause after a failed fetch before ticking resumes.
    fn retry_backoff(&self) -> Duration {
        Duration::from_secs(1)
    }

    /// Fetch the current version and a fresh snapshot.
    async fn fetch(&self) -> Result<(Self::Version, Self::Snapshot), FetchError>;

    /// Is a snapshot at `current` stale enough to warrant a fetch?
    fn is_outdated(&self, current: &Self::Version) -> bool;
}

/// The producer loop run on behalf of [`Reloadable::with_poller`].
///
/// Exiting before the first send makes construction fail with
/// `ReloadError::ProducerExited`.
///
/// [`Reloadable::with_poller`]: crate::reload::Reloadable::with_poller
pub(crate) async fn run<P: Poller>(poller: P, tx: UpdateSender<P::Snapshot>) {
    let (mut version, first) = match poller.fetch().await {
        Ok(fetched) => fetched,
        Err(e) => {
            tracing::warn!(error = %e, "Initial fetch failed");
            return;
        }
    };

    if tx.send(Some(Arc::new(first))).await.is_err() {
        return;
    }

    let mut tick = tokio::time::interval(poller.interval());
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of a tokio interval fires immediately; we just fetched.
    tick.tick().await;

    loop {
        tick.tick().await;

        if !poller.is_outdated(&version) {
            continue;
        }

        match poller.fetch().await {
            Ok((fetched_version, snapshot)) => {
                version = fetched_version;
                if tx.send(Some(Arc::new(snapshot))).await.is_err() {
                    // Cell dropped; nothing left to publish to.
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Fetch failed, backing off");
                tokio::time::sleep(poller.retry_backoff()).await;
            }
        }
    }
}
