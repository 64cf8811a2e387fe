//! Bounded delivery queue with a single consumer task.
//!
//! Producers on the sampling path push without waiting; one worker task per
//! queue drains messages in FIFO order into a [`Deliver`] implementation.
//! Shutdown closes the channel, which acts as the end-of-stream sentinel:
//! everything accepted before the close is delivered before the worker
//! exits, and any later push is handed back as `Closed`.

use async_channel::TrySendError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Consumes messages taken off a [`DeliveryQueue`].
#[async_trait]
pub trait Deliver<M>: Send + 'static {
    /// Delivers one message. Failures are handled (logged, counted) here;
    /// the queue never retries.
    async fn deliver(&mut self, message: M);
}

#[derive(Error, Debug)]
pub enum QueueError<M> {
    #[error("delivery queue is full")]
    Full(M),

    #[error("delivery queue is shut down")]
    Closed(M),
}

impl<M> QueueError<M> {
    /// Returns the rejected message to the caller.
    pub fn into_inner(self) -> M {
        match self {
            QueueError::Full(m) | QueueError::Closed(m) => m,
        }
    }
}

/// A bounded multi-producer, single-consumer queue.
pub struct DeliveryQueue<M> {
    name: &'static str,
    tx: async_channel::Sender<M>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<M: Send + 'static> DeliveryQueue<M> {
    /// Creates the queue and spawns its consumer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<D>(name: &'static str, capacity: usize, mut sink: D) -> Self
    where
        D: Deliver<M>,
    {
        let (tx, rx) = async_channel::bounded::<M>(capacity.max(1));

        let handle = tokio::spawn(async move {
            debug!(queue = name, "Delivery worker started");
            // `recv` keeps yielding queued messages after the close and
            // fails only once the channel is empty.
            while let Ok(message) = rx.recv().await {
                sink.deliver(message).await;
            }
            debug!(queue = name, "Delivery worker finished");
        });

        Self {
            name,
            tx,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueues a message without waiting.
    ///
    /// A full or shut-down queue hands the message back so the caller can
    /// apply its own fallback.
    pub fn push(&self, message: M) -> Result<(), QueueError<M>> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(m)) => {
                metrics::counter!("queue_rejected_total", "queue" => self.name).increment(1);
                Err(QueueError::Full(m))
            }
            Err(TrySendError::Closed(m)) => Err(QueueError::Closed(m)),
        }
    }

    /// Number of messages waiting for the consumer.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Stops accepting messages, drains what is queued, and waits for the
    /// consumer to exit. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(queue = self.name, pending = self.tx.len(), "Shutting down delivery queue");
        self.tx.close();

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(queue = self.name, error = %e, "Delivery worker panicked");
            }
        }
    }
}
