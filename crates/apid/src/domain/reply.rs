//! Broker replies and their typed conversions.

use crate::domain::command::ReplyShape;
use std::fmt;
use thiserror::Error;

/// A raw reply as produced by a broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Integer(i64),
    Bulk(Vec<u8>),
    Status(String),
    Array(Vec<Reply>),
    /// Error reply from the broker (e.g. `WRONGTYPE`).
    Error(String),
}

impl Reply {
    pub fn bulk(value: impl Into<Vec<u8>>) -> Self {
        Self::Bulk(value.into())
    }

    pub fn ok() -> Self {
        Self::Status("OK".to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Integer(_) => "integer",
            Self::Bulk(_) => "string",
            Self::Status(_) => "status",
            Self::Array(_) => "array",
            Self::Error(_) => "error",
        }
    }

    fn into_text(self, expected: ReplyShape) -> Result<String, MalformedReply> {
        match self {
            Self::Bulk(bytes) => {
                String::from_utf8(bytes).map_err(|_| MalformedReply::new(expected, "non-utf8 string"))
            }
            Self::Status(text) => Ok(text),
            other => Err(MalformedReply::new(expected, other.kind())),
        }
    }
}

/// A reply whose shape did not match its command family.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected:?} reply, found {found}")]
pub struct MalformedReply {
    pub expected: ReplyShape,
    pub found: &'static str,
}

impl MalformedReply {
    pub fn new(expected: ReplyShape, found: &'static str) -> Self {
        Self { expected, found }
    }
}

/// Typed view of a reply.
pub trait FromReply: Sized + Send + 'static {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply>;
}

/// Acknowledgement: any non-error reply.
impl FromReply for () {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        match reply {
            Reply::Error(_) => Err(MalformedReply::new(ReplyShape::Any, "error")),
            _ => Ok(()),
        }
    }
}

impl FromReply for i64 {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        match reply {
            Reply::Integer(n) => Ok(n),
            other => Err(MalformedReply::new(ReplyShape::Integer, other.kind())),
        }
    }
}

impl FromReply for bool {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        i64::from_reply(reply).map(|n| n != 0)
    }
}

impl FromReply for Option<String> {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        match reply {
            Reply::Nil => Ok(None),
            other => other.into_text(ReplyShape::OptionalString).map(Some),
        }
    }
}

impl FromReply for Vec<String> {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        match reply {
            Reply::Array(items) => items
                .into_iter()
                .map(|item| item.into_text(ReplyShape::StringArray))
                .collect(),
            other => Err(MalformedReply::new(ReplyShape::StringArray, other.kind())),
        }
    }
}

/// Outcome of a blocking pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    Value(String),
    TimedOut,
}

impl FromReply for Popped {
    fn from_reply(reply: Reply) -> Result<Self, MalformedReply> {
        match reply {
            Reply::Nil => Ok(Self::TimedOut),
            Reply::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                // [queue, value]; the queue name is already known to the caller.
                let _queue = items.next();
                match items.next() {
                    Some(value) => value.into_text(ReplyShape::Popped).map(Self::Value),
                    None => Err(MalformedReply::new(ReplyShape::Popped, "array")),
                }
            }
            other => Err(MalformedReply::new(ReplyShape::Popped, other.kind())),
        }
    }
}

/// One step of a set enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetEntry {
    Member(String),
    /// Emitted exactly once, after the last member.
    Done,
}

impl fmt::Display for SetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(member) => write!(f, "{}", member),
            Self::Done => write!(f, "<done>"),
        }
    }
}
