//! lnbridge Message Routing
//!
//! The stateless dispatcher bridging the control bus and the broker:
//! - Three operating modes (local only, broker only, gateway)
//! - Route-class tagging of messages crossing between the buses
//! - Echo suppression so loop-back frames never amplify
//! - Request ID assignment for application submissions

pub mod dispatch;
pub mod error;
pub mod handler;
pub mod mode;
pub mod router;

pub use dispatch::{classify_broker, classify_control_bus, Action, Decision};
pub use error::{Result, RoutingError};
pub use handler::{ApplicationHandler, ChannelHandler};
pub use mode::Mode;
pub use router::{Router, RouterStats};
