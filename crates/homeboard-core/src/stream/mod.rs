// ── Reactive entity streams ──
//
// Subscription types for consuming mirror changes from the DataStore.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::DeviceFilter;

/// A subscription to a collection of entities.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct EntityStream<T: Clone + Send + Sync + 'static> {
    current: Arc<Vec<Arc<T>>>,
    receiver: watch::Receiver<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<T>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<Vec<Arc<T>>> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<Vec<Arc<T>>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the DataStore has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Arc<T>>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct EntityWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Arc<Vec<Arc<T>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
