//! lnbridge Bus Transport Layer
//!
//! The capability the router consumes twice, once for the control bus and
//! once for the broker:
//! - non-blocking submit returning a transport-defined identifier
//! - a delivery handler invoked from the transport's processing pass
//! - a periodic processing entry point driven by the host
//!
//! Real drivers live outside this workspace. `loopback` provides in-memory
//! stand-ins that reproduce the echo behavior of both buses.

pub mod error;
pub mod loopback;
pub mod transport;

pub use error::{Result, TransportError};
pub use loopback::{LoopbackHandle, LoopbackTransport};
pub use transport::{BusKind, BusTransport, SubmitId, TransportStatus};
