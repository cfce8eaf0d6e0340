//! Per-worker subscription registry
//!
//! Maps topic names to the connections of one worker. The registry is owned
//! by that worker's event loop and is only reachable through deferred calls,
//! so it needs no locking: every method runs on the loop thread, one call at
//! a time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::connection::{Connection, ConnectionId};
use super::error::RegistryError;
use super::topic;

/// Topic → subscriber mapping for a single worker
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Index of the owning worker (for logging)
    worker: usize,

    /// Connections currently served by this worker
    connections: HashMap<ConnectionId, Connection>,

    /// Subscribers per topic; empty sets are pruned
    topics: HashMap<String, HashSet<ConnectionId>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry for the given worker
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }

    /// Index of the owning worker
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Start tracking a connection
    pub fn attach(&mut self, connection: Connection) {
        tracing::debug!(
            worker = self.worker,
            connection_id = connection.id(),
            "Connection attached"
        );
        self.connections.insert(connection.id(), connection);
    }

    /// Forget a connection and drop it from every topic
    ///
    /// Returns false if the connection was not attached.
    pub fn detach(&mut self, id: ConnectionId) -> bool {
        let Some(_connection) = self.connections.remove(&id) else {
            return false;
        };

        self.topics.retain(|_, subscribers| {
            subscribers.remove(&id);
            !subscribers.is_empty()
        });

        tracing::debug!(
            worker = self.worker,
            connection_id = id,
            "Connection detached"
        );
        true
    }

    /// Subscribe a connection to `topic` (`all` expands to the server topics)
    ///
    /// Returns the concrete topics that were subscribed.
    pub fn subscribe(
        &mut self,
        id: ConnectionId,
        topic: &str,
    ) -> Result<Vec<String>, RegistryError> {
        self.ensure_attached(id)?;

        let expanded = topic::expand(topic);
        for name in &expanded {
            self.topics.entry((*name).to_string()).or_default().insert(id);
        }

        tracing::debug!(worker = self.worker, connection_id = id, topic, "Subscribed");
        Ok(expanded.into_iter().map(str::to_string).collect())
    }

    /// Unsubscribe a connection from `topic` (`all` expands as for subscribe)
    ///
    /// Returns the concrete topics named by the request.
    pub fn unsubscribe(
        &mut self,
        id: ConnectionId,
        topic: &str,
    ) -> Result<Vec<String>, RegistryError> {
        self.ensure_attached(id)?;

        let expanded = topic::expand(topic);
        for name in &expanded {
            if let Some(subscribers) = self.topics.get_mut(*name) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    self.topics.remove(*name);
                }
            }
        }

        tracing::debug!(worker = self.worker, connection_id = id, topic, "Unsubscribed");
        Ok(expanded.into_iter().map(str::to_string).collect())
    }

    /// Topics a connection is subscribed to, in registry iteration order
    pub fn topics_of(&self, id: ConnectionId) -> Result<Vec<String>, RegistryError> {
        self.ensure_attached(id)?;

        Ok(self
            .topics
            .iter()
            .filter(|(_, subscribers)| subscribers.contains(&id))
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Deliver `payload` to every local subscriber of `topic`
    ///
    /// Best effort: returns how many outboxes accepted the payload. Closed
    /// or full outboxes are skipped. A topic with no subscribers is a
    /// silent no-op.
    pub fn publish(&self, topic: &str, payload: &Arc<str>) -> usize {
        let Some(subscribers) = self.topics.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for id in subscribers {
            match self.connections.get(id) {
                Some(connection) if connection.send(payload) => delivered += 1,
                _ => {
                    tracing::debug!(
                        worker = self.worker,
                        connection_id = *id,
                        topic,
                        "Payload not delivered"
                    );
                }
            }
        }

        tracing::trace!(worker = self.worker, topic, delivered, "Published");
        delivered
    }

    /// Number of attached connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of local subscribers of a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashSet::len)
    }

    fn ensure_attached(&self, id: ConnectionId) -> Result<(), RegistryError> {
        if self.connections.contains_key(&id) {
            Ok(())
        } else {
            Err(RegistryError::UnknownConnection(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn attach(
        registry: &mut SubscriptionRegistry,
        id: ConnectionId,
    ) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(16);
        registry.attach(Connection::new(id, tx));
        rx
    }

    fn sorted(mut topics: Vec<String>) -> Vec<String> {
        topics.sort();
        topics
    }

    #[test]
    fn test_subscribe_all_expands() {
        let mut registry = SubscriptionRegistry::new(0);
        let _rx = attach(&mut registry, 1);

        let subscribed = registry.subscribe(1, "all").unwrap();
        assert_eq!(subscribed, vec!["query", "mutation", "random"]);

        let topics = sorted(registry.topics_of(1).unwrap());
        assert_eq!(topics, vec!["mutation", "query", "random"]);
        assert_eq!(registry.subscriber_count("all"), 0);
    }

    #[test]
    fn test_unsubscribe_all() {
        let mut registry = SubscriptionRegistry::new(0);
        let _rx = attach(&mut registry, 1);

        registry.subscribe(1, "all").unwrap();
        registry.subscribe(1, "custom").unwrap();
        registry.unsubscribe(1, "all").unwrap();

        assert_eq!(registry.topics_of(1).unwrap(), vec!["custom"]);
        assert_eq!(registry.subscriber_count("query"), 0);
    }

    #[test]
    fn test_publish_only_reaches_subscribers() {
        let mut registry = SubscriptionRegistry::new(0);
        let mut subscribed = attach(&mut registry, 1);
        let mut idle = attach(&mut registry, 2);

        registry.subscribe(1, "mutation").unwrap();

        let delivered = registry.publish("mutation", &Arc::from("created"));
        assert_eq!(delivered, 1);
        assert_eq!(subscribed.try_recv().unwrap().as_ref(), "created");
        assert!(idle.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let mut registry = SubscriptionRegistry::new(0);
        let mut rx = attach(&mut registry, 1);

        assert_eq!(registry.publish("query", &Arc::from("nobody")), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_detach_clears_every_topic() {
        let mut registry = SubscriptionRegistry::new(0);
        let _a = attach(&mut registry, 1);
        let _b = attach(&mut registry, 2);

        registry.subscribe(1, "all").unwrap();
        registry.subscribe(2, "query").unwrap();

        assert!(registry.detach(1));
        assert!(!registry.detach(1));

        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.subscriber_count("mutation"), 0);
        assert_eq!(registry.subscriber_count("query"), 1);
        assert_eq!(
            registry.topics_of(1),
            Err(RegistryError::UnknownConnection(1))
        );
    }

    #[test]
    fn test_unknown_connection_rejected() {
        let mut registry = SubscriptionRegistry::new(3);

        assert_eq!(
            registry.subscribe(42, "query"),
            Err(RegistryError::UnknownConnection(42))
        );
        assert_eq!(registry.subscriber_count("query"), 0);
    }

    #[test]
    fn test_publish_skips_closed_outbox() {
        let mut registry = SubscriptionRegistry::new(0);
        let rx = attach(&mut registry, 1);
        registry.subscribe(1, "random").unwrap();
        drop(rx);

        assert_eq!(registry.publish("random", &Arc::from("tick")), 0);
    }

    #[test]
    fn test_publish_skips_full_outbox() {
        let mut registry = SubscriptionRegistry::new(0);
        let (tx, mut stalled) = mpsc::channel(1);
        registry.attach(Connection::new(1, tx));
        let mut reading = attach(&mut registry, 2);
        registry.subscribe(1, "query").unwrap();
        registry.subscribe(2, "query").unwrap();

        assert_eq!(registry.publish("query", &Arc::from("first")), 2);
        assert_eq!(registry.publish("query", &Arc::from("second")), 1);

        assert_eq!(stalled.try_recv().unwrap().as_ref(), "first");
        assert!(stalled.try_recv().is_err());
        assert_eq!(reading.try_recv().unwrap().as_ref(), "first");
        assert_eq!(reading.try_recv().unwrap().as_ref(), "second");
    }

    #[test]
    fn test_subscribe_twice_is_idempotent() {
        let mut registry = SubscriptionRegistry::new(0);
        let mut rx = attach(&mut registry, 1);

        registry.subscribe(1, "query").unwrap();
        registry.subscribe(1, "all").unwrap();

        assert_eq!(registry.publish("query", &Arc::from("once")), 1);
        assert_eq!(rx.try_recv().unwrap().as_ref(), "once");
        assert!(rx.try_recv().is_err());
    }
}
