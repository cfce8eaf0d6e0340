//! Worker threads and cross-loop broadcasting
//!
//! Each worker is one OS thread running a current-thread tokio runtime. On
//! that runtime it serves its own listening socket and drives one
//! [`EventLoop`], which owns the worker's subscription registry.
//!
//! ```text
//!  any thread ── LoopHandle::defer(f) ──► mpsc (FIFO) ──► EventLoop::run ── f(&mut registry)
//! ```
//!
//! Deferred callbacks run exactly once, on the loop's thread, strictly one
//! after another, in the order they were submitted to that loop. There is
//! no ordering between different loops.

pub mod dispatcher;
pub mod event_loop;
pub mod thread;

pub use dispatcher::BroadcastDispatcher;
pub use event_loop::{EventLoop, LoopHandle};
pub use thread::Worker;
