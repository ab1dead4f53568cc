//! Operating mode

use crate::error::RoutingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating posture of the router
///
/// The numeric codes match the values stored by existing devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum Mode {
    /// Control bus to application only
    #[serde(alias = "ln")]
    LocalOnly = 0,
    /// Broker to application only
    #[serde(alias = "mqtt")]
    BrokerOnly = 1,
    /// Full bridge between control bus, broker and application
    #[default]
    #[serde(alias = "gw")]
    Gateway = 2,
}

impl Mode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Mode {
    type Error = RoutingError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Mode::LocalOnly),
            1 => Ok(Mode::BrokerOnly),
            2 => Ok(Mode::Gateway),
            other => Err(RoutingError::InvalidMode(other.to_string())),
        }
    }
}

impl FromStr for Mode {
    type Err = RoutingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "local-only" | "local" | "ln" => Ok(Mode::LocalOnly),
            "broker-only" | "broker" | "mqtt" => Ok(Mode::BrokerOnly),
            "gateway" | "gw" => Ok(Mode::Gateway),
            _ => Err(RoutingError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::LocalOnly => write!(f, "local-only"),
            Mode::BrokerOnly => write!(f, "broker-only"),
            Mode::Gateway => write!(f, "gateway"),
        }
    }
}
