//! Broadcast event types
//!
//! A broadcast event is a `(topic, payload)` pair that lives only for the
//! duration of a fan-out. The payload is an `Arc<str>` so every worker and
//! every subscriber shares the same allocation.

use std::sync::Arc;

use serde::Serialize;

use super::topic;
use crate::store::Todo;

/// A `(topic, payload)` pair to be fanned out to every worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastEvent {
    pub topic: String,
    pub payload: Arc<str>,
}

impl BroadcastEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Arc<str>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Event on the `query` topic
    pub fn query(payload: impl Into<Arc<str>>) -> Self {
        Self::new(topic::QUERY, payload)
    }

    /// Event on the `mutation` topic
    pub fn mutation(payload: impl Into<Arc<str>>) -> Self {
        Self::new(topic::MUTATION, payload)
    }

    /// Event on the `random` topic
    pub fn random(payload: impl Into<Arc<str>>) -> Self {
        Self::new(topic::RANDOM, payload)
    }
}

/// JSON payload describing a completed store operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TodoEvent {
    Listed { worker: usize, todos: Vec<Todo> },
    Fetched { worker: usize, todo: Todo },
    Created { worker: usize, todo: Todo },
    Updated { worker: usize, todo: Todo },
    Deleted { worker: usize, todo: Todo },
}

impl TodoEvent {
    /// Topic this event is published on
    pub fn topic(&self) -> &'static str {
        match self {
            TodoEvent::Listed { .. } | TodoEvent::Fetched { .. } => topic::QUERY,
            TodoEvent::Created { .. } | TodoEvent::Updated { .. } | TodoEvent::Deleted { .. } => {
                topic::MUTATION
            }
        }
    }

    /// Encode into a broadcast event on the matching topic
    pub fn to_broadcast(&self) -> serde_json::Result<BroadcastEvent> {
        let payload = serde_json::to_string(self)?;
        Ok(BroadcastEvent::new(self.topic(), payload))
    }
}
