//! Broker port (driven).
//!
//! The client needs three things from a broker: a pipelined command
//! connection, a subscription connection that delivers published messages,
//! and the ability to open extra command connections for blocking pops.
//!
//! Error replies to individual commands (`WRONGTYPE` and friends) are not
//! [`BrokerError`]s; they come back as [`Reply::Error`]. A `BrokerError`
//! always means the connection itself failed.

use crate::domain::{Command, Reply};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Connection-level broker failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("connection closed by broker")]
    Closed,

    #[error("i/o error: {0}")]
    Io(String),
}

/// A message delivered on the subscription connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Set when delivered through a pattern subscription.
    pub pattern: Option<String>,
    pub channel: String,
    pub payload: Vec<u8>,
}

impl BrokerMessage {
    pub fn message(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            pattern: None,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    pub fn pmessage(
        pattern: impl Into<String>,
        channel: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            pattern: Some(pattern.into()),
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Factory for broker connections.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Short name of the backing implementation (`"redis"`, `"memory"`).
    fn implementation(&self) -> &'static str;

    /// Open a command connection.
    async fn open_commands(&self) -> Result<Box<dyn CommandConnection>, BrokerError>;

    /// Open a subscription connection.
    async fn open_subscriptions(&self) -> Result<SubscriptionConnection, BrokerError>;
}

/// A connection that executes commands one at a time.
#[async_trait]
pub trait CommandConnection: Send {
    async fn execute(&mut self, command: &Command) -> Result<Reply, BrokerError>;
}

/// Control half of a subscription connection.
#[async_trait]
pub trait SubscriptionSink: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError>;
    async fn psubscribe(&mut self, pattern: &str) -> Result<(), BrokerError>;
}

/// A subscription connection split into its control half and its message
/// stream. The stream ends when the connection is lost.
pub struct SubscriptionConnection {
    pub sink: Box<dyn SubscriptionSink>,
    pub messages: BoxStream<'static, BrokerMessage>,
}
