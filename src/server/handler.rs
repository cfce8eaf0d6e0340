//! Business logic interface
//!
//! The HTTP layer talks to records only through [`TodoHandler`]. The server
//! is generic over it, so any backend that can list, read, create, update
//! and delete todos can sit behind the same routes and broadcasts.

use crate::error::Result;
use crate::store::{NewTodo, SharedStore, Todo, TodoId, TodoPatch};

/// Record operations used by the request handlers
///
/// Called from every worker thread concurrently. An `Err` is reported to the
/// client as a 500.
pub trait TodoHandler: Send + Sync + 'static {
    /// All records
    fn list(&self) -> Result<Vec<Todo>>;

    /// One record, `None` if unknown
    fn get(&self, id: TodoId) -> Result<Option<Todo>>;

    /// Store a new record under a freshly allocated id
    fn create(&self, new: NewTodo) -> Result<Todo>;

    /// Merge `patch` into the record at `id`, creating it if absent
    fn update(&self, id: TodoId, patch: TodoPatch) -> Result<Todo>;

    /// Remove a record, returning it if it existed
    fn delete(&self, id: TodoId) -> Result<Option<Todo>>;
}

impl TodoHandler for SharedStore {
    fn list(&self) -> Result<Vec<Todo>> {
        Ok(SharedStore::list(self))
    }

    fn get(&self, id: TodoId) -> Result<Option<Todo>> {
        Ok(SharedStore::get(self, id))
    }

    fn create(&self, new: NewTodo) -> Result<Todo> {
        SharedStore::create(self, new)
    }

    fn update(&self, id: TodoId, patch: TodoPatch) -> Result<Todo> {
        Ok(SharedStore::update(self, id, patch))
    }

    fn delete(&self, id: TodoId) -> Result<Option<Todo>> {
        Ok(SharedStore::remove(self, id))
    }
}
