//! Cross-worker broadcast fan-out
//!
//! The dispatcher never touches a registry itself. For every worker it
//! defers a `publish` onto that worker's loop, so delivery always happens on
//! the thread owning the registry.
//!
//! Because each loop drains its queue in FIFO order, two events broadcast
//! one after the other by the same producer reach every worker in that
//! order. Events from different producers, and delivery across different
//! workers, are not ordered relative to each other.

use std::sync::Arc;

use crate::registry::BroadcastEvent;

use super::event_loop::LoopHandle;

/// Fans one event out to every worker's registry
#[derive(Clone, Debug)]
pub struct BroadcastDispatcher {
    loops: Arc<[LoopHandle]>,
}

impl BroadcastDispatcher {
    /// Create a dispatcher over the given worker loops
    pub fn new(loops: Vec<LoopHandle>) -> Self {
        Self {
            loops: loops.into(),
        }
    }

    /// Schedule a publish of `event` on every worker
    ///
    /// Does not wait for delivery. Returns the number of loops that accepted
    /// the deferred publish.
    pub fn broadcast(&self, event: BroadcastEvent) -> usize {
        let mut scheduled = 0;

        for handle in self.loops.iter() {
            let deferred = event.clone();
            let result = handle.defer(move |registry| {
                registry.publish(&deferred.topic, &deferred.payload);
            });

            match result {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    tracing::warn!(
                        worker = handle.index(),
                        topic = %event.topic,
                        error = %e,
                        "Broadcast dropped for worker"
                    );
                }
            }
        }

        scheduled
    }

    /// Convenience wrapper around [`BroadcastDispatcher::broadcast`]
    pub fn publish(&self, topic: &str, payload: impl Into<Arc<str>>) -> usize {
        self.broadcast(BroadcastEvent::new(topic, payload))
    }

    /// Number of workers reached by a broadcast
    pub fn worker_count(&self) -> usize {
        self.loops.len()
    }

    /// Handle for one worker's loop
    pub fn loop_handle(&self, index: usize) -> Option<&LoopHandle> {
        self.loops.iter().find(|handle| handle.index() == index)
    }
}
