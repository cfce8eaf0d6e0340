//! HTTP and WebSocket serving
//!
//! [`TodoServer`] owns startup. Each worker runs the [`routes::router`]
//! for its own socket; request handling goes through the [`TodoHandler`]
//! and every successful operation is fanned out through the worker's
//! [`crate::worker::BroadcastDispatcher`].

pub mod body;
pub mod config;
pub mod handler;
pub mod lifecycle;
pub mod listener;
pub mod response;
pub mod routes;
pub mod ws;

pub use config::{RandomConfig, ServerConfig, DEFAULT_PORT};
pub use handler::TodoHandler;
pub use listener::{RunningServer, TodoServer};
pub use response::ApiError;
