//! Transport error types

use thiserror::Error;

/// Transport-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport not ready: {0}")]
    NotReady(String),

    #[error("Transmit queue full on {name} (capacity {capacity})")]
    QueueFull { name: String, capacity: usize },

    #[error("Frame rejected: {0}")]
    Rejected(String),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
