//! Error types for protocol operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Request ID out of range: {0} (max: {max})", max = crate::types::REQUEST_ID_MAX)]
    RequestIdOutOfRange(u16),

    #[error("Route class {0} cannot be assigned as a live tag")]
    ReservedRouteClass(crate::types::RouteClass),
}
