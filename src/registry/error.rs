//! Registry error types
//!
//! Error types for subscription registry operations.

use super::connection::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The connection was never attached to this registry, or already left
    #[error("connection {0} is not attached to this worker")]
    UnknownConnection(ConnectionId),
}
