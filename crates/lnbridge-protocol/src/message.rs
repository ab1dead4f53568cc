//! Message exchanged between the control bus and the broker

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{CorrelationTag, RequestId, RouteClass};

/// A message in flight between the two buses
///
/// The payload is opaque and never modified. Only the correlation tag and
/// the echo flag are rewritten as the message moves through the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Raw frame bytes
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,

    /// Request ID and route class
    pub tag: CorrelationTag,

    /// Set when this delivery is the loop-back of our own transmission
    pub echo: bool,
}

impl Message {
    /// Create an untagged message with an unassigned request ID
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Message {
            payload: payload.into(),
            tag: CorrelationTag::default(),
            echo: false,
        }
    }

    /// Builder: set the request ID, keeping the route class
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.tag = self.tag.with_request_id(request_id);
        self
    }

    /// Builder: replace the whole correlation field
    pub fn with_tag(mut self, tag: CorrelationTag) -> Self {
        self.tag = tag;
        self
    }

    /// Builder: set the echo flag
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.tag.request_id()
    }

    pub fn route_class(&self) -> RouteClass {
        self.tag.route_class()
    }

    /// Stamp a live route class, keeping the request ID
    pub fn set_route_class(&mut self, class: RouteClass) -> Result<()> {
        self.tag = self.tag.tagged(class)?;
        Ok(())
    }

    /// Clear the route class, keeping the request ID
    pub fn clear_route_class(&mut self) {
        self.tag = self.tag.untagged();
    }

    /// Clear route class and echo flag
    pub fn detag(&mut self) {
        self.clear_route_class();
        self.echo = false;
    }

    /// True when no routing bits or echo flag remain
    pub fn is_detagged(&self) -> bool {
        self.route_class() == RouteClass::Untagged && !self.echo
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
