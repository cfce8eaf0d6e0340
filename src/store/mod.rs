//! Shared record store
//!
//! The store is the single source of truth for todo records and the only
//! resource shared across worker threads. Every read goes through the shared
//! side of a `parking_lot::RwLock`, every write through the exclusive side.
//!
//! ```text
//!   worker 0 ──┐
//!   worker 1 ──┼──► Arc<SharedStore> ──► RwLock<HashMap<id, Todo>>
//!   worker N ──┘
//! ```

pub mod record;
pub mod shared;

pub use record::{NewTodo, Todo, TodoId, TodoPatch};
pub use shared::SharedStore;
