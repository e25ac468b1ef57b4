// ── Reactive state streams ──
//
// Subscription types for consuming state transitions from a controller.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::TableState;

/// A subscription to one controller's state transitions.
///
/// Combines snapshot access (`current`, `latest`) with change
/// notification: await `changed()` directly, or convert into a `Stream`
/// for combinator-style consumption.
pub struct StateStream<R: Clone + Send + Sync + 'static> {
    current: Arc<TableState<R>>,
    receiver: watch::Receiver<Arc<TableState<R>>>,
}

impl<R: Clone + Send + Sync + 'static> StateStream<R> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<TableState<R>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot seen when this subscription last looked
    /// (at creation, or the last `changed()` return).
    pub fn current(&self) -> &Arc<TableState<R>> {
        &self.current
    }

    /// The snapshot live right now, without waiting.
    pub fn latest(&self) -> Arc<TableState<R>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next transition and return its snapshot, or `None`
    /// once the controller is gone.
    pub async fn changed(&mut self) -> Option<Arc<TableState<R>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` usable with `StreamExt` combinators.
    pub fn into_stream(self) -> StateWatchStream<R> {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter over the controller's `watch` channel.
///
/// Yields the snapshot current at conversion time first, then a new
/// `Arc<TableState<R>>` for each transition after it.
pub struct StateWatchStream<R: Clone + Send + Sync + 'static> {
    inner: WatchStream<Arc<TableState<R>>>,
}

impl<R: Clone + Send + Sync + 'static> Stream for StateWatchStream<R> {
    type Item = Arc<TableState<R>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // WatchStream is Unpin, so re-pinning the field is sound.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
