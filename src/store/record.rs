//! Todo record types
//!
//! JSON shapes accepted and produced by the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// Record identifier
pub type TodoId = u32;

/// A stored todo record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique, stable identifier
    pub id: TodoId,
    /// Free-form description
    pub description: String,
    /// Completion flag
    pub completed: bool,
}

impl Todo {
    /// Create a record
    pub fn new(id: TodoId, description: impl Into<String>, completed: bool) -> Self {
        Self {
            id,
            description: description.into(),
            completed,
        }
    }
}

/// Body of a create request; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTodo {
    pub description: String,
    pub completed: bool,
}

impl NewTodo {
    pub fn new(description: impl Into<String>, completed: bool) -> Self {
        Self {
            description: description.into(),
            completed,
        }
    }

    /// Attach an id, producing the stored form
    pub fn into_todo(self, id: TodoId) -> Todo {
        Todo {
            id,
            description: self.description,
            completed: self.completed,
        }
    }
}

/// Body of an update request
///
/// Fields left out keep their current value. When the record does not exist
/// yet they default to an empty description and `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Apply the patch on top of `current`, or on defaults if absent
    pub fn apply(self, id: TodoId, current: Option<&Todo>) -> Todo {
        let (description, completed) = match current {
            Some(todo) => (todo.description.clone(), todo.completed),
            None => (String::new(), false),
        };

        Todo {
            id,
            description: self.description.unwrap_or(description),
            completed: self.completed.unwrap_or(completed),
        }
    }
}
