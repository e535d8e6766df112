//! Handle for a streaming request.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::ClientError;

pub(crate) type Canceller = Box<dyn FnOnce() + Send>;

/// A live stream of updates for one request.
///
/// Ends (`next()` returns `None`) when the stream is cancelled, when a
/// snapshot request has delivered everything, or when the connection is
/// lost; [`Subscription::last_error`] then tells which. Dropping the
/// handle cancels the stream.
pub struct Subscription<T> {
    id: i32,
    rx: mpsc::UnboundedReceiver<T>,
    error: Arc<OnceLock<ClientError>>,
    cancel: Option<Canceller>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: i32,
        rx: mpsc::UnboundedReceiver<T>,
        error: Arc<OnceLock<ClientError>>,
        cancel: Canceller,
    ) -> Self {
        Subscription {
            id,
            rx,
            error,
            cancel: Some(cancel),
        }
    }

    /// Ticker id of the request on the wire.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Next update, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop the stream and tell the gateway (best effort). Idempotent.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Why the stream ended; `None` while live or after a clean end.
    pub fn last_error(&self) -> Option<ClientError> {
        self.error.get().cloned()
    }
}

impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.cancel.is_none())
            .field("last_error", &self.error.get())
            .finish()
    }
}
