//! Correlation field types

use crate::error::{ProtocolError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mask selecting the request ID bits (0-13)
pub const REQUEST_ID_MASK: u16 = 0x3FFF;

/// Mask selecting the route class bits (14-15)
pub const ROUTE_CLASS_MASK: u16 = 0xC000;

/// Bit position of the route class
pub const ROUTE_CLASS_SHIFT: u16 = 14;

/// Largest request ID representable in 14 bits
pub const REQUEST_ID_MAX: u16 = REQUEST_ID_MASK;

/// 14-bit identifier correlating a request with its reply
///
/// Zero is reserved for "unassigned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct RequestId(u16);

impl RequestId {
    /// The unassigned request ID
    pub const UNASSIGNED: RequestId = RequestId(0);

    /// Create a request ID, rejecting values wider than 14 bits
    pub fn new(value: u16) -> Result<Self> {
        if value > REQUEST_ID_MAX {
            return Err(ProtocolError::RequestIdOutOfRange(value));
        }
        Ok(RequestId(value))
    }

    /// Draw a request ID uniformly from `1..=REQUEST_ID_MAX`
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        RequestId(rng.gen_range(1..=REQUEST_ID_MAX))
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl TryFrom<u16> for RequestId {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self> {
        RequestId::new(value)
    }
}

impl From<RequestId> for u16 {
    fn from(id: RequestId) -> u16 {
        id.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Route class carried in the two high bits of the correlation field
///
/// Marks why a message entered the pipeline. Internal to the router: it is
/// always cleared before a message leaves toward the application or the
/// broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RouteClass {
    /// Newly observed on the control bus (0x0000)
    Untagged = 0x0000,
    /// Relayed from the broker onto the control bus (0x4000)
    FromBroker = 0x4000,
    /// Submitted by the local application (0x8000)
    FromApplication = 0x8000,
    /// Extraction/clearing mask, never a live tag (0xC000)
    Reserved = 0xC000,
}

impl RouteClass {
    /// Extract the route class from a raw correlation field
    pub fn from_bits(bits: u16) -> Self {
        match (bits & ROUTE_CLASS_MASK) >> ROUTE_CLASS_SHIFT {
            0 => RouteClass::Untagged,
            1 => RouteClass::FromBroker,
            2 => RouteClass::FromApplication,
            _ => RouteClass::Reserved,
        }
    }

    /// Bits of this class, already shifted into place
    pub fn bits(self) -> u16 {
        self as u16
    }

    /// Whether this class may be stamped on a message
    pub fn is_live(self) -> bool {
        self != RouteClass::Reserved
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteClass::Untagged => write!(f, "Untagged"),
            RouteClass::FromBroker => write!(f, "FromBroker"),
            RouteClass::FromApplication => write!(f, "FromApplication"),
            RouteClass::Reserved => write!(f, "Reserved"),
        }
    }
}

/// The 16-bit correlation field in its wire encoding
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationTag(u16);

impl CorrelationTag {
    /// Wrap raw wire bits
    pub fn from_bits(bits: u16) -> Self {
        CorrelationTag(bits)
    }

    /// Untagged field carrying `request_id`
    pub fn new(request_id: RequestId) -> Self {
        CorrelationTag(request_id.value())
    }

    /// Raw wire bits
    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn request_id(&self) -> RequestId {
        RequestId(self.0 & REQUEST_ID_MASK)
    }

    pub fn route_class(&self) -> RouteClass {
        RouteClass::from_bits(self.0)
    }

    /// Same request ID, route class cleared
    pub fn untagged(self) -> Self {
        CorrelationTag(self.0 & !ROUTE_CLASS_MASK)
    }

    /// Same request ID, stamped with a live route class
    pub fn tagged(self, class: RouteClass) -> Result<Self> {
        if !class.is_live() {
            return Err(ProtocolError::ReservedRouteClass(class));
        }
        Ok(CorrelationTag((self.0 & REQUEST_ID_MASK) | class.bits()))
    }

    /// Same route class, request ID replaced
    pub fn with_request_id(self, request_id: RequestId) -> Self {
        CorrelationTag((self.0 & ROUTE_CLASS_MASK) | request_id.value())
    }
}

impl fmt::Debug for CorrelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CorrelationTag({:#06x}: {} #{})",
            self.0,
            self.route_class(),
            self.request_id()
        )
    }
}
