//! Error types for the apid client.

use crate::domain::{AddressError, ConfigError, MalformedReply};
use crate::ports::BrokerError;
use thiserror::Error;

/// Which of the client's connections an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// Carries every non-blocking command.
    Command,
    /// Carries `SUBSCRIBE`/`PSUBSCRIBE` and the messages they deliver.
    Subscription,
    /// Short-lived connection dedicated to one blocking pop.
    Blocking,
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::Subscription => "subscription",
            Self::Blocking => "blocking",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by [`crate::Apid`].
#[derive(Debug, Error)]
pub enum ApidError {
    /// Connection-level failure. Fatal: the reactor stops and
    /// [`crate::Apid::start`] returns this error.
    #[error("transport error on {role} connection: {source}")]
    Transport {
        role: ConnectionRole,
        #[source]
        source: BrokerError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// Only delivered when the malformed-reply policy is `surface`.
    #[error("malformed reply to {command}: {reply}")]
    MalformedReply {
        command: &'static str,
        #[source]
        reply: MalformedReply,
    },

    /// A bounded method wait expired before any reply arrived.
    #[error("no reply on {destination} within the requested wait")]
    Timeout { destination: String },

    #[error("reactor is already running")]
    AlreadyRunning,

    /// The client's worker tasks are gone (after a fatal error or shutdown).
    #[error("client is shut down")]
    Shutdown,
}

impl ApidError {
    pub(crate) fn transport(role: ConnectionRole, source: BrokerError) -> Self {
        Self::Transport { role, source }
    }

    /// True for errors that end the reactor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Shutdown)
    }
}

pub type ApidResult<T> = Result<T, ApidError>;
