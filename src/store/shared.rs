//! Lock-protected record store
//!
//! All operations are synchronous and hold the lock only for the map
//! operation itself, so contention between workers stays short.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::record::{NewTodo, Todo, TodoId, TodoPatch};
use crate::error::{Error, Result};

/// In-memory todo store shared by every worker
///
/// Constructed once at startup and handed to the workers behind an `Arc`.
/// Invariant: every key equals the `id` of the record stored under it.
#[derive(Debug, Default)]
pub struct SharedStore {
    todos: RwLock<HashMap<TodoId, Todo>>,
}

impl SharedStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, sorted by id
    pub fn list(&self) -> Vec<Todo> {
        let todos = self.todos.read();
        let mut all: Vec<Todo> = todos.values().cloned().collect();
        drop(todos);

        all.sort_by_key(|todo| todo.id);
        all
    }

    /// Look up a record
    pub fn get(&self, id: TodoId) -> Option<Todo> {
        self.todos.read().get(&id).cloned()
    }

    /// Insert or replace a record under its own id
    pub fn upsert(&self, todo: Todo) {
        self.todos.write().insert(todo.id, todo);
    }

    /// Remove a record, returning it if it existed
    pub fn remove(&self, id: TodoId) -> Option<Todo> {
        self.todos.write().remove(&id)
    }

    /// One greater than the current maximum id, or 1 when empty
    ///
    /// `None` once `TodoId::MAX` is taken. Only a hint: another writer may
    /// insert before the caller does. Use [`SharedStore::create`] to
    /// allocate and insert atomically.
    pub fn next_id(&self) -> Option<TodoId> {
        next_id_in(&self.todos.read())
    }

    /// Allocate the next id and insert the record under one write lock
    ///
    /// Fails with [`Error::IdSpaceExhausted`] when `TodoId::MAX` is already
    /// in use; no existing record is ever replaced.
    pub fn create(&self, new: NewTodo) -> Result<Todo> {
        let mut todos = self.todos.write();
        let id = next_id_in(&todos).ok_or(Error::IdSpaceExhausted)?;
        let todo = new.into_todo(id);
        todos.insert(id, todo.clone());
        Ok(todo)
    }

    /// Merge `patch` into the record at `id`, creating it if absent
    pub fn update(&self, id: TodoId, patch: TodoPatch) -> Todo {
        let mut todos = self.todos.write();
        let todo = patch.apply(id, todos.get(&id));
        todos.insert(id, todo.clone());
        todo
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.todos.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.todos.read().is_empty()
    }
}

fn next_id_in(todos: &HashMap<TodoId, Todo>) -> Option<TodoId> {
    match todos.keys().max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}
