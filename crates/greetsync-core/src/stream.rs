// ── Reactive store stream ──
//
// Subscription type for consuming greeting-store changes.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::StoreSnapshot;

/// A subscription to the greeting store.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct StoreStream {
    current: StoreSnapshot,
    receiver: watch::Receiver<StoreSnapshot>,
}

impl StoreStream {
    pub(crate) fn new(receiver: watch::Receiver<StoreSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &StoreSnapshot {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> StoreSnapshot {
        self.receiver.borrow().clone()
    }

    /// Whether a mutation happened that `changed()` has not yet returned.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<StoreSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The first item is the current snapshot.
    pub fn into_stream(self) -> StoreWatchStream {
        StoreWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct StoreWatchStream {
    inner: WatchStream<StoreSnapshot>,
}

impl Stream for StoreWatchStream {
    type Item = StoreSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
