//! Multi-worker in-memory todo service with WebSocket pub/sub
//!
//! Todos are kept in one process-wide [`SharedStore`] and served over HTTP by
//! several worker threads sharing a listening port. WebSocket clients
//! subscribe to topics on whichever worker accepted them; every store
//! operation is broadcast to the subscribers of every worker.
//!
//! # Example
//!
//! ```no_run
//! use todos_rs::{ServerConfig, SharedStore, TodoServer};
//!
//! fn main() -> todos_rs::Result<()> {
//!     let config = ServerConfig::default().workers(4);
//!     let server = TodoServer::new(config, SharedStore::new());
//!     let running = server.start()?;
//!     println!("listening on {}", running.local_addr());
//!     running.wait();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod generator;
pub mod registry;
pub mod server;
pub mod store;
pub mod worker;

pub use error::{Error, Result};
pub use registry::{BroadcastEvent, SubscriptionRegistry, TodoEvent};
pub use server::{RandomConfig, RunningServer, ServerConfig, TodoHandler, TodoServer};
pub use store::{NewTodo, SharedStore, Todo, TodoId, TodoPatch};
pub use worker::{BroadcastDispatcher, EventLoop, LoopHandle};
