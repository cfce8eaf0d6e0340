//! Connection handles
//!
//! A connection is represented inside the registry by its id and the sending
//! half of its outbound queue. The socket itself stays with the task serving
//! it; the registry only ever pushes text payloads into the queue.
//!
//! The queue is bounded. A client that stops reading loses payloads once
//! [`OUTBOX_CAPACITY`] frames are waiting; publishing never blocks the loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Unique connection identifier (unique across all workers)
pub type ConnectionId = u64;

/// Frames a connection may have queued before new payloads are dropped
pub const OUTBOX_CAPACITY: usize = 256;

/// Sending half of a connection's outbound text queue
pub type Outbox = mpsc::Sender<Arc<str>>;

/// Registry-side handle for one WebSocket connection
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbox: Outbox,
    /// Token presented at upgrade time; carried but not checked
    auth_token: Option<String>,
}

impl Connection {
    /// Create a new handle
    pub fn new(id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            id,
            outbox,
            auth_token: None,
        }
    }

    /// Attach the client's auth token
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Queue a payload for the client without waiting
    ///
    /// Returns false if the outbox is full or the connection task has
    /// already gone away. Either way the payload is dropped.
    pub fn send(&self, payload: &Arc<str>) -> bool {
        match self.outbox.try_send(Arc::clone(payload)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(connection_id = self.id, "Outbox full, payload dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
