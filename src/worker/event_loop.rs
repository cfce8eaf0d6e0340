//! Serialized per-worker task queue
//!
//! The queue is an unbounded tokio mpsc channel of boxed callbacks. Senders
//! are cheap to clone and usable from any thread; the receiver and the
//! registry it feeds live inside [`EventLoop`] and never leave the worker.

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::registry::SubscriptionRegistry;

type Deferred = Box<dyn FnOnce(&mut SubscriptionRegistry) + Send + 'static>;

/// Loop-local state plus the queue that feeds it
pub struct EventLoop {
    index: usize,
    tasks: mpsc::UnboundedReceiver<Deferred>,
    registry: SubscriptionRegistry,
}

impl EventLoop {
    /// Create a loop for worker `index` and the handle used to reach it
    pub fn new(index: usize) -> (Self, LoopHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_loop = Self {
            index,
            tasks: rx,
            registry: SubscriptionRegistry::new(index),
        };
        (event_loop, LoopHandle { index, tx })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Execute deferred callbacks until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!(worker = self.index, "Event loop started");

        while let Some(task) = self.tasks.recv().await {
            task(&mut self.registry);
        }

        tracing::debug!(worker = self.index, "Event loop stopped");
    }
}

/// Thread-safe handle for scheduling work on one loop
#[derive(Clone)]
pub struct LoopHandle {
    index: usize,
    tx: mpsc::UnboundedSender<Deferred>,
}

impl LoopHandle {
    /// Index of the worker this handle points at
    pub fn index(&self) -> usize {
        self.index
    }

    /// Schedule `f` to run later on the loop's own thread
    ///
    /// Never blocks and never runs `f` inline, even when called from the
    /// loop's thread.
    pub fn defer<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut SubscriptionRegistry) + Send + 'static,
    {
        self.tx
            .send(Box::new(f))
            .map_err(|_| Error::LoopClosed(self.index))
    }

    /// Defer `f` and wait for its result
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut SubscriptionRegistry) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.defer(move |registry| {
            let _ = reply_tx.send(f(registry));
        })?;

        reply_rx.await.map_err(|_| Error::LoopClosed(self.index))
    }

    /// Whether the loop has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("index", &self.index)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
