//! Ordered hand-off of received chunks from the receive task to the session

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use super::types::{ClientError, ResponseMessage};

/// Create a connected sink/queue pair
pub fn response_channel() -> (ResponseSink, ResponseQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let reads = Arc::new(AtomicU64::new(0));
    (
        ResponseSink {
            tx,
            reads: reads.clone(),
        },
        ResponseQueue { rx, reads },
    )
}

/// Producer side, owned by the receive task
#[derive(Debug)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<ResponseMessage>,
    reads: Arc<AtomicU64>,
}

impl ResponseSink {
    /// Enqueue one chunk; returns `false` once the queue has been dropped
    pub fn push(&self, message: ResponseMessage) -> bool {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.tx.send(message).is_ok()
    }
}

/// Consumer side, owned by the session
///
/// Each enqueued message is handed out at most once, in arrival order.
#[derive(Debug)]
pub struct ResponseQueue {
    rx: mpsc::UnboundedReceiver<ResponseMessage>,
    reads: Arc<AtomicU64>,
}

impl ResponseQueue {
    /// Wait up to `timeout` for the next message
    ///
    /// Buffered messages are still delivered after the sink is gone; only an
    /// empty queue with no producer reports `EndOfStream`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<ResponseMessage, ClientError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(ClientError::EndOfStream),
            Err(_) => Err(ClientError::ResponseTimeout(timeout)),
        }
    }

    /// Number of chunks the producer has read from the stream so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}
