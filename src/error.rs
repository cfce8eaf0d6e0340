//! Crate-level error type

use std::net::SocketAddr;

/// Errors raised by the server runtime and the todo handler
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker could not bind its listening endpoint
    #[error("worker {worker} failed to bind {addr}: {source}")]
    Bind {
        worker: usize,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The worker's event loop has stopped accepting deferred calls
    #[error("event loop of worker {0} is closed")]
    LoopClosed(usize),

    /// A worker thread died before reporting whether it is listening
    #[error("worker startup failed: {0}")]
    WorkerStartup(String),

    /// No id above the current maximum is left to allocate
    #[error("todo id space exhausted")]
    IdSpaceExhausted,

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else a handler could not complete
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
