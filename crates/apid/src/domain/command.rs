//! Broker commands.
//!
//! Every operation is expressed in the broker's native command vocabulary.
//! Constructors fix both the command name and the argument order, so
//! deployments mixing this client with older ones see identical traffic.

use std::fmt;
use std::time::Duration;

/// Longest bounded wait sent to the broker. Anything longer blocks forever;
/// the broker rejects timeouts it cannot add to its clock.
pub const MAX_BOUNDED_WAIT: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// How long a blocking pop may wait for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wait {
    /// Block until a value arrives (broker timeout `0`).
    #[default]
    Forever,
    /// Give up after the given duration.
    For(Duration),
}

impl Wait {
    /// Render as a `BRPOP` timeout argument, in seconds.
    pub fn as_timeout_arg(&self) -> String {
        match self {
            Self::Forever => "0".to_string(),
            Self::For(duration) if *duration > MAX_BOUNDED_WAIT => "0".to_string(),
            Self::For(duration) => {
                // A zero timeout would mean "forever" on the broker.
                let secs = duration.as_secs_f64().max(0.001);
                format!("{:.3}", secs)
            }
        }
    }
}

/// Shape a reply must have for the command family that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Any non-error reply is accepted.
    Any,
    Integer,
    /// Bulk string or nil.
    OptionalString,
    /// Array of bulk strings.
    StringArray,
    /// Two-element `[key, value]` array, or nil on timeout.
    Popped,
}

/// A single broker command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    args: Vec<String>,
}

impl Command {
    pub(crate) fn new(name: &'static str, args: Vec<String>) -> Self {
        Self { name, args }
    }

    pub fn publish(channel: &str, payload: &str) -> Self {
        Self::new("PUBLISH", vec![channel.into(), payload.into()])
    }

    pub fn get(key: &str) -> Self {
        Self::new("GET", vec![key.into()])
    }

    pub fn set(key: &str, value: &str) -> Self {
        Self::new("SET", vec![key.into(), value.into()])
    }

    pub fn del(key: &str) -> Self {
        Self::new("DEL", vec![key.into()])
    }

    pub fn sadd(key: &str, member: &str) -> Self {
        Self::new("SADD", vec![key.into(), member.into()])
    }

    pub fn srem(key: &str, member: &str) -> Self {
        Self::new("SREM", vec![key.into(), member.into()])
    }

    pub fn smembers(key: &str) -> Self {
        Self::new("SMEMBERS", vec![key.into()])
    }

    pub fn sismember(key: &str, member: &str) -> Self {
        Self::new("SISMEMBER", vec![key.into(), member.into()])
    }

    pub fn hset(key: &str, field: &str, value: &str) -> Self {
        Self::new("HSET", vec![key.into(), field.into(), value.into()])
    }

    pub fn hget(key: &str, field: &str) -> Self {
        Self::new("HGET", vec![key.into(), field.into()])
    }

    pub fn lpush(key: &str, value: &str) -> Self {
        Self::new("LPUSH", vec![key.into(), value.into()])
    }

    pub fn brpop(key: &str, wait: Wait) -> Self {
        Self::new("BRPOP", vec![key.into(), wait.as_timeout_arg()])
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// `BRPOP` holds its connection until a value arrives, so it never goes
    /// through the shared command pipeline.
    pub fn is_blocking(&self) -> bool {
        self.name == "BRPOP"
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
