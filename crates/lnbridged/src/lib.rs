//! lnbridged - control-bus / broker gateway daemon
//!
//! Hosts one router and drives its periodic processing entry point.

pub mod config;
pub mod node;

pub use config::Config;
pub use node::GatewayNode;
