//! Bus transport trait

use crate::error::Result;
use lnbridge_protocol::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-defined submission identifier
///
/// Never zero for an accepted frame.
pub type SubmitId = u16;

/// Which side of the bridge a transport serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusKind {
    /// Half-duplex serial control bus
    ControlBus,
    /// Publish/subscribe broker connection
    Broker,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::ControlBus => write!(f, "control-bus"),
            BusKind::Broker => write!(f, "broker"),
        }
    }
}

/// Transport status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportStatus {
    /// Accepting frames and delivering inbound traffic
    Ready,
    /// Link down; submissions are refused
    Offline,
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportStatus::Ready => write!(f, "Ready"),
            TransportStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Bus transport trait
///
/// Implementations must not block in any method. `process` is called
/// regularly by the host; every received or echoed frame is handed to
/// `deliver` exactly once, from inside that call.
pub trait BusTransport: Send {
    /// Which bus this transport serves
    fn kind(&self) -> BusKind;

    /// Human-readable instance name
    fn name(&self) -> &str;

    /// Queue a frame for transmission
    fn submit(&mut self, message: Message) -> Result<SubmitId>;

    /// Drive the transport's I/O state machine
    fn process(&mut self, deliver: &mut dyn FnMut(Message));

    /// Current status
    fn status(&self) -> TransportStatus;
}
