//! Client configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `APID` | `unix:/tmp/apid.socket` | Broker address |
//! | `APID_MALFORMED_REPLIES` | `drop` | `drop` or `surface` |
//! | `APID_CORRELATION` | `random` | `random` or `sequential` |
//! | `APID_EVENT_CAPACITY` | `1024` | Reactor event queue capacity |

use crate::domain::address::{AddressError, BrokerAddress};
use crate::domain::correlation::CorrelationStrategy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Default capacity of the reactor event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// What the dispatcher does with a reply of the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedReplyPolicy {
    /// Release the operation without invoking its callback.
    #[default]
    Drop,
    /// Invoke the callback with [`crate::ApidError::MalformedReply`].
    Surface,
}

impl FromStr for MalformedReplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "surface" => Ok(Self::Surface),
            other => Err(format!("unknown malformed reply policy: {}", other)),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid broker address: {0}")]
    Address(#[from] AddressError),

    #[error("event capacity must be greater than 0")]
    ZeroEventCapacity,

    #[error("unix socket path is empty")]
    EmptySocketPath,
}

/// Configuration for an [`crate::Apid`] client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApidConfig {
    pub address: BrokerAddress,
    pub malformed_replies: MalformedReplyPolicy,
    pub correlation: CorrelationStrategy,
    pub event_capacity: usize,
}

impl Default for ApidConfig {
    fn default() -> Self {
        Self {
            address: BrokerAddress::default(),
            malformed_replies: MalformedReplyPolicy::default(),
            correlation: CorrelationStrategy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ApidConfig {
    /// Build configuration from the environment.
    ///
    /// An unparsable `APID` address is an error. Unparsable optional settings
    /// fall back to their defaults with a warning.
    pub fn from_env() -> Result<Self, ConfigError> {
        let address = match env::var("APID") {
            Ok(addr) => addr.parse()?,
            Err(_) => BrokerAddress::default(),
        };

        Ok(Self {
            address,
            malformed_replies: parse_var("APID_MALFORMED_REPLIES").unwrap_or_default(),
            correlation: parse_var("APID_CORRELATION").unwrap_or_default(),
            event_capacity: parse_var("APID_EVENT_CAPACITY").unwrap_or(DEFAULT_EVENT_CAPACITY),
        })
    }

    pub fn with_address(mut self, address: BrokerAddress) -> Self {
        self.address = address;
        self
    }

    pub fn with_malformed_replies(mut self, policy: MalformedReplyPolicy) -> Self {
        self.malformed_replies = policy;
        self
    }

    pub fn with_correlation(mut self, strategy: CorrelationStrategy) -> Self {
        self.correlation = strategy;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if let BrokerAddress::Unix(path) = &self.address {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptySocketPath);
            }
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(variable = name, value = %raw, error = %e, "Ignoring invalid setting");
            None
        }
    }
}
