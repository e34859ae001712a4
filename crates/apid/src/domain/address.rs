//! Broker address parsing.
//!
//! A single address string selects the transport:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `unix:<path>` | Unix domain socket at `<path>` |
//! | `tcp:<host>:<port>` | TCP connection to `<host>` on `<port>` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Address used when no address is configured.
pub const DEFAULT_ADDRESS: &str = "unix:/tmp/apid.socket";

/// Errors from parsing a broker address string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("tcp address is missing a port: {0}")]
    MissingPort(String),

    #[error("invalid port in address {address}: {port}")]
    InvalidPort { address: String, port: String },

    #[error("unknown address scheme (expected unix: or tcp:): {0}")]
    UnknownScheme(String),
}

/// Where the broker listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum BrokerAddress {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// Host and port pair.
    Tcp { host: String, port: u16 },
}

impl BrokerAddress {
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }
}

impl Default for BrokerAddress {
    fn default() -> Self {
        Self::unix("/tmp/apid.socket")
    }
}

impl FromStr for BrokerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(path) = s.strip_prefix("unix:") {
            return Ok(Self::unix(path));
        }

        let Some(rest) = s.strip_prefix("tcp:") else {
            return Err(AddressError::UnknownScheme(s.to_string()));
        };

        // The host may itself contain colons (IPv6), so the port is whatever
        // follows the last one.
        let Some((host, port)) = rest.rsplit_once(':') else {
            return Err(AddressError::MissingPort(s.to_string()));
        };

        let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
            address: s.to_string(),
            port: port.to_string(),
        })?;

        Ok(Self::tcp(host, port))
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

impl From<BrokerAddress> for String {
    fn from(address: BrokerAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for BrokerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
