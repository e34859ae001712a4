//! Redis-backed broker adapter.

use crate::domain::{BrokerAddress, Command, Reply};
use crate::ports::{
    Broker, BrokerError, BrokerMessage, CommandConnection, SubscriptionConnection,
    SubscriptionSink,
};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSubSink};
use redis::{Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError, Value};
use tracing::debug;

/// Broker reached through a Redis server.
pub struct RedisBroker {
    client: Client,
    address: BrokerAddress,
}

impl RedisBroker {
    /// Prepare a client for `address`. No connection is made until one is
    /// opened.
    pub fn new(address: &BrokerAddress) -> Result<Self, BrokerError> {
        let addr = match address {
            BrokerAddress::Unix(path) => ConnectionAddr::Unix(path.clone()),
            BrokerAddress::Tcp { host, port } => ConnectionAddr::Tcp(host.clone(), *port),
        };
        let info = ConnectionInfo {
            addr,
            redis: RedisConnectionInfo::default(),
        };
        let client = Client::open(info).map_err(|e| BrokerError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            address: address.clone(),
        })
    }

    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }
}

#[async_trait]
impl Broker for RedisBroker {
    fn implementation(&self) -> &'static str {
        "redis"
    }

    async fn open_commands(&self) -> Result<Box<dyn CommandConnection>, BrokerError> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        debug!(address = %self.address, "Opened command connection");
        Ok(Box::new(RedisCommandConnection { conn }))
    }

    async fn open_subscriptions(&self) -> Result<SubscriptionConnection, BrokerError> {
        let pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;
        debug!(address = %self.address, "Opened subscription connection");

        let (sink, stream) = pubsub.split();
        let messages = stream
            .map(|msg: redis::Msg| {
                let pattern = if msg.from_pattern() {
                    msg.get_pattern::<String>().ok()
                } else {
                    None
                };
                BrokerMessage {
                    pattern,
                    channel: msg.get_channel_name().to_string(),
                    payload: msg.get_payload_bytes().to_vec(),
                }
            })
            .boxed();

        Ok(SubscriptionConnection {
            sink: Box::new(RedisSubscriptionSink { sink }),
            messages,
        })
    }
}

struct RedisCommandConnection {
    conn: MultiplexedConnection,
}

#[async_trait]
impl CommandConnection for RedisCommandConnection {
    async fn execute(&mut self, command: &Command) -> Result<Reply, BrokerError> {
        let mut cmd = redis::cmd(command.name());
        for arg in command.args() {
            cmd.arg(arg);
        }

        let result: redis::RedisResult<Value> = cmd.query_async(&mut self.conn).await;
        match result {
            Ok(value) => Ok(to_reply(value)),
            Err(e) if is_transport_error(&e) => Err(BrokerError::Io(e.to_string())),
            // Error replies from the server are ordinary replies here.
            Err(e) => Ok(Reply::Error(e.to_string())),
        }
    }
}

struct RedisSubscriptionSink {
    sink: PubSubSink,
}

#[async_trait]
impl SubscriptionSink for RedisSubscriptionSink {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.sink
            .subscribe(channel)
            .await
            .map_err(|e| BrokerError::Io(e.to_string()))
    }

    async fn psubscribe(&mut self, pattern: &str) -> Result<(), BrokerError> {
        self.sink
            .psubscribe(pattern)
            .await
            .map_err(|e| BrokerError::Io(e.to_string()))
    }
}

fn is_transport_error(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

fn to_reply(value: Value) -> Reply {
    match value {
        Value::Nil => Reply::Nil,
        Value::Int(n) => Reply::Integer(n),
        Value::BulkString(bytes) => Reply::Bulk(bytes),
        Value::SimpleString(text) => Reply::Status(text),
        Value::Okay => Reply::ok(),
        Value::Array(items) => Reply::Array(items.into_iter().map(to_reply).collect()),
        other => Reply::Error(format!("unsupported reply: {:?}", other)),
    }
}
