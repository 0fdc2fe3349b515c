use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

/// One event emitted by a streaming completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEvent {
    /// Cumulative response-so-far. Each snapshot supersedes the previous one
    /// wholesale; it is never a delta.
    Snapshot(String),
    Done,
    Error(String),
}

/// Boxed worker future that feeds a response stream. The caller spawns it;
/// it exits once the stream completes, fails, or is cancelled.
pub type ModelWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Receiving half of one streaming completion.
///
/// Dropping the stream signals cancellation to the worker, so an abandoned
/// completion stops producing promptly.
pub struct ResponseStream {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// A live completion: the event stream plus the worker future driving it.
pub struct ResponseStreamHandle {
    pub stream: ResponseStream,
    pub worker: ModelWorker,
}

impl ResponseStream {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<SnapshotEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub async fn recv(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SnapshotEvent> {
        self.events.try_recv().ok()
    }

    /// Signals cancellation to the worker. Returns false when the worker has
    /// already finished.
    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Stream for ResponseStream {
    type Item = SnapshotEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub(crate) fn make_response_stream() -> (
    mpsc::UnboundedSender<SnapshotEvent>,
    ResponseStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (event_tx, ResponseStream::new(event_rx, cancel_tx), cancel_rx)
}
