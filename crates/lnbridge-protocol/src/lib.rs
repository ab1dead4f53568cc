//! lnbridge Protocol Module
//!
//! This module defines the message model shared by both buses and the
//! bit-exact encoding of the 16-bit correlation field:
//! - `RequestId` in bits 0-13
//! - `RouteClass` in bits 14-15

pub mod error;
pub mod message;
pub mod types;

pub use error::{ProtocolError, Result};
pub use message::Message;
pub use types::{CorrelationTag, RequestId, RouteClass};
