//! Routing error types

use lnbridge_transport::BusKind;
use thiserror::Error;

/// Routing-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("No control-bus transport attached")]
    NoControlBus,

    #[error("Transport serves the {found} side, expected {expected}")]
    WrongBusKind { expected: BusKind, found: BusKind },

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] lnbridge_protocol::ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] lnbridge_transport::TransportError),
}

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;
