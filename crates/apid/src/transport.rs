//! Transport Binding.
//!
//! Owns the client's broker connections and turns everything they produce
//! into [`ReactorEvent`]s on a single bounded queue:
//!
//! - a command worker executes submissions in FIFO order on one pipelined
//!   connection
//! - a subscription worker issues `SUBSCRIBE`/`PSUBSCRIBE` and forwards
//!   delivered messages
//! - each blocking pop gets its own short-lived connection so it never
//!   holds up the command pipeline
//!
//! Connection failures are reported once as [`ReactorEvent::Failed`].

use crate::domain::{Command, Reply};
use crate::error::{ApidError, ConnectionRole};
use crate::ports::{Broker, BrokerError, BrokerMessage, CommandConnection, SubscriptionSink};
use crate::registry::OperationHandle;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Everything the reactor reacts to.
#[derive(Debug)]
pub enum ReactorEvent {
    /// A command finished; its reply belongs to `handle`.
    Completed {
        handle: OperationHandle,
        reply: Reply,
    },
    /// A message arrived on a subscribed channel or pattern.
    Delivered(BrokerMessage),
    /// A connection failed. Fatal.
    Failed {
        role: ConnectionRole,
        error: BrokerError,
    },
}

struct Submission {
    handle: OperationHandle,
    command: Command,
}

enum SubscriptionRequest {
    Channel(String),
    Pattern(String),
}

pub(crate) struct Transport {
    broker: Arc<dyn Broker>,
    runtime: Handle,
    submissions: mpsc::UnboundedSender<Submission>,
    subscriptions: mpsc::UnboundedSender<SubscriptionRequest>,
    events: mpsc::Sender<ReactorEvent>,
    closed: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Transport {
    /// Open the command and subscription connections and start their
    /// workers. Events queue up (to `capacity`) until the receiver is read.
    pub(crate) async fn connect(
        broker: Arc<dyn Broker>,
        capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<ReactorEvent>), ApidError> {
        let commands = broker
            .open_commands()
            .await
            .map_err(|e| ApidError::transport(ConnectionRole::Command, e))?;
        let subscription = broker
            .open_subscriptions()
            .await
            .map_err(|e| ApidError::transport(ConnectionRole::Subscription, e))?;

        let runtime = Handle::current();
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (submissions_tx, submissions_rx) = mpsc::unbounded_channel();
        let (subscriptions_tx, subscriptions_rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);

        let workers = vec![
            runtime.spawn(run_commands(commands, submissions_rx, events_tx.clone())),
            runtime.spawn(run_subscription_control(
                subscription.sink,
                subscriptions_rx,
                events_tx.clone(),
            )),
            runtime.spawn(run_subscription_messages(
                subscription.messages,
                events_tx.clone(),
            )),
        ];

        info!(
            implementation = broker.implementation(),
            capacity = capacity,
            "[Transport] Connected"
        );

        Ok((
            Self {
                broker,
                runtime,
                submissions: submissions_tx,
                subscriptions: subscriptions_tx,
                events: events_tx,
                closed,
                workers,
            },
            events_rx,
        ))
    }

    pub(crate) fn implementation(&self) -> &'static str {
        self.broker.implementation()
    }

    /// Queue a command. Replies come back as [`ReactorEvent::Completed`] in
    /// submission order, except for blocking pops which complete whenever
    /// the broker answers them.
    pub(crate) fn submit(&self, handle: OperationHandle, command: Command) -> Result<(), ApidError> {
        if command.is_blocking() {
            self.spawn_blocking_pop(handle, command);
            return Ok(());
        }
        self.submissions
            .send(Submission { handle, command })
            .map_err(|_| ApidError::Shutdown)
    }

    pub(crate) fn subscribe(&self, channel: &str) -> Result<(), ApidError> {
        self.subscriptions
            .send(SubscriptionRequest::Channel(channel.to_string()))
            .map_err(|_| ApidError::Shutdown)
    }

    pub(crate) fn psubscribe(&self, pattern: &str) -> Result<(), ApidError> {
        self.subscriptions
            .send(SubscriptionRequest::Pattern(pattern.to_string()))
            .map_err(|_| ApidError::Shutdown)
    }

    fn spawn_blocking_pop(&self, handle: OperationHandle, command: Command) {
        let broker = self.broker.clone();
        let events = self.events.clone();
        let mut closed = self.closed.subscribe();

        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                _ = closed.changed() => return,
                outcome = blocking_call(broker.as_ref(), &command) => outcome,
            };
            let event = match outcome {
                Ok(reply) => ReactorEvent::Completed { handle, reply },
                Err(error) => {
                    error!(handle = %handle, error = %error, "[Transport] Blocking connection failed");
                    ReactorEvent::Failed {
                        role: ConnectionRole::Blocking,
                        error,
                    }
                }
            };
            let _ = events.send(event).await;
        });
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        let _ = self.closed.send(true);
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn blocking_call(broker: &dyn Broker, command: &Command) -> Result<Reply, BrokerError> {
    let mut connection = broker.open_commands().await?;
    debug!(command = %command, "[Transport] Blocking pop started");
    connection.execute(command).await
}

async fn run_commands(
    mut connection: Box<dyn CommandConnection>,
    mut submissions: mpsc::UnboundedReceiver<Submission>,
    events: mpsc::Sender<ReactorEvent>,
) {
    while let Some(Submission { handle, command }) = submissions.recv().await {
        let event = match connection.execute(&command).await {
            Ok(reply) => ReactorEvent::Completed { handle, reply },
            Err(error) => {
                error!(command = %command, error = %error, "[Transport] Command connection failed");
                let _ = events
                    .send(ReactorEvent::Failed {
                        role: ConnectionRole::Command,
                        error,
                    })
                    .await;
                return;
            }
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    debug!("[Transport] Command worker stopped");
}

async fn run_subscription_control(
    mut sink: Box<dyn SubscriptionSink>,
    mut requests: mpsc::UnboundedReceiver<SubscriptionRequest>,
    events: mpsc::Sender<ReactorEvent>,
) {
    while let Some(request) = requests.recv().await {
        let result = match &request {
            SubscriptionRequest::Channel(channel) => {
                debug!(channel = %channel, "[Transport] SUBSCRIBE");
                sink.subscribe(channel).await
            }
            SubscriptionRequest::Pattern(pattern) => {
                debug!(pattern = %pattern, "[Transport] PSUBSCRIBE");
                sink.psubscribe(pattern).await
            }
        };
        if let Err(error) = result {
            error!(error = %error, "[Transport] Subscription connection failed");
            let _ = events
                .send(ReactorEvent::Failed {
                    role: ConnectionRole::Subscription,
                    error,
                })
                .await;
            return;
        }
    }
}

async fn run_subscription_messages(
    mut messages: BoxStream<'static, BrokerMessage>,
    events: mpsc::Sender<ReactorEvent>,
) {
    while let Some(message) = messages.next().await {
        if events.send(ReactorEvent::Delivered(message)).await.is_err() {
            return;
        }
    }
    error!("[Transport] Subscription stream ended");
    let _ = events
        .send(ReactorEvent::Failed {
            role: ConnectionRole::Subscription,
            error: BrokerError::Closed,
        })
        .await;
}
