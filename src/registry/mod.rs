//! Subscription registry for pub/sub routing
//!
//! Every worker owns exactly one [`SubscriptionRegistry`]. It is never
//! shared: the worker's event loop holds it by value and hands a `&mut` to
//! deferred callbacks one at a time. Other threads reach it only by deferring
//! a callback onto that loop.
//!
//! # Architecture
//!
//! ```text
//!   BroadcastDispatcher::broadcast(event)
//!         │
//!         ├── defer ──► [worker 0 loop] ── registry.publish() ──► outboxes ──► WS
//!         ├── defer ──► [worker 1 loop] ── registry.publish() ──► outboxes ──► WS
//!         └── defer ──► [worker N loop] ── registry.publish() ──► outboxes ──► WS
//! ```
//!
//! # Zero-Copy Payloads
//!
//! Payloads are `Arc<str>`, so every worker and every subscriber shares the
//! same allocation. Only the reference count is touched per delivery.

pub mod connection;
pub mod error;
pub mod event;
pub mod subscriptions;
pub mod topic;

pub use connection::{Connection, ConnectionId, Outbox, OUTBOX_CAPACITY};
pub use error::RegistryError;
pub use event::{BroadcastEvent, TodoEvent};
pub use subscriptions::SubscriptionRegistry;
