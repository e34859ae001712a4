//! In-process broker.
//!
//! Implements the same command vocabulary as the networked broker, over
//! plain collections guarded by a mutex. Suitable for tests and for
//! single-process deployments; clones share the same state, so several
//! clients can talk to each other through one `InMemoryBroker`.

use crate::domain::{glob_match, Command, Reply};
use crate::ports::{
    Broker, BrokerError, BrokerMessage, CommandConnection, SubscriptionConnection,
    SubscriptionSink,
};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

const WRONGTYPE: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";

struct Subscriber {
    channels: HashSet<String>,
    patterns: HashSet<String>,
    tx: mpsc::UnboundedSender<BrokerMessage>,
}

#[derive(Default)]
struct State {
    closed: bool,
    strings: HashMap<String, String>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
    subscribers: HashMap<u64, Subscriber>,
}

impl State {
    fn type_of(&self, key: &str) -> Option<&'static str> {
        if self.strings.contains_key(key) {
            Some("string")
        } else if self.sets.contains_key(key) {
            Some("set")
        } else if self.hashes.contains_key(key) {
            Some("hash")
        } else if self.lists.contains_key(key) {
            Some("list")
        } else {
            None
        }
    }

    /// True if `key` is absent or holds `kind`.
    fn holds(&self, key: &str, kind: &str) -> bool {
        self.type_of(key).map_or(true, |t| t == kind)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        self.strings.remove(key).is_some()
            || self.sets.remove(key).is_some()
            || self.hashes.remove(key).is_some()
            || self.lists.remove(key).is_some()
    }

    fn pop_back(&mut self, key: &str) -> Option<String> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    fn publish(&mut self, channel: &str, payload: &str) -> i64 {
        self.subscribers.retain(|_, sub| !sub.tx.is_closed());

        let mut receivers = 0;
        for sub in self.subscribers.values() {
            if sub.channels.contains(channel)
                && sub
                    .tx
                    .send(BrokerMessage::message(channel, payload))
                    .is_ok()
            {
                receivers += 1;
            }
            for pattern in sub.patterns.iter().filter(|p| glob_match(p, channel)) {
                if sub
                    .tx
                    .send(BrokerMessage::pmessage(pattern.as_str(), channel, payload))
                    .is_ok()
                {
                    receivers += 1;
                }
            }
        }
        receivers
    }
}

struct Shared {
    state: Mutex<State>,
    /// Signalled on every push and on shutdown.
    pushed: Notify,
    next_subscriber: AtomicU64,
}

/// In-process broker. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                pushed: Notify::new(),
                next_subscriber: AtomicU64::new(0),
            }),
        }
    }

    /// Sever every connection, as if the broker went away.
    ///
    /// Pending and future commands fail with [`BrokerError::Closed`] and
    /// every subscription stream ends.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.subscribers.clear();
        }
        self.shared.pushed.notify_waiters();
        debug!("In-memory broker shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Connections subscribed to exactly `channel`.
    pub fn channel_subscribers(&self, channel: &str) -> usize {
        let state = self.shared.state.lock();
        state
            .subscribers
            .values()
            .filter(|sub| sub.channels.contains(channel))
            .count()
    }

    /// Connections subscribed to `pattern`.
    pub fn pattern_subscribers(&self, pattern: &str) -> usize {
        let state = self.shared.state.lock();
        state
            .subscribers
            .values()
            .filter(|sub| sub.patterns.contains(pattern))
            .count()
    }

    /// Length of the list stored at `key` (0 if absent).
    pub fn list_len(&self, key: &str) -> usize {
        self.shared
            .state
            .lock()
            .lists
            .get(key)
            .map_or(0, VecDeque::len)
    }

    fn apply(&self, command: &Command) -> Result<Reply, BrokerError> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }

        let args = command.args();
        let arity_ok = match command.name() {
            "GET" | "DEL" | "SMEMBERS" => args.len() == 1,
            "PUBLISH" | "SET" | "SREM" | "SISMEMBER" | "HGET" => args.len() == 2,
            "SADD" | "LPUSH" => args.len() >= 2,
            "HSET" => args.len() >= 3 && args.len() % 2 == 1,
            _ => true,
        };
        if !arity_ok {
            return Ok(Reply::Error(format!(
                "ERR wrong number of arguments for '{}' command",
                command.name().to_ascii_lowercase()
            )));
        }

        let reply = match command.name() {
            "PUBLISH" => Reply::Integer(state.publish(&args[0], &args[1])),
            "SET" => {
                state.remove_key(&args[0]);
                state.strings.insert(args[0].clone(), args[1].clone());
                Reply::ok()
            }
            "GET" => {
                if !state.holds(&args[0], "string") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                state
                    .strings
                    .get(&args[0])
                    .map_or(Reply::Nil, |v| Reply::bulk(v.as_str()))
            }
            "DEL" => Reply::Integer(i64::from(state.remove_key(&args[0]))),
            "SADD" => {
                if !state.holds(&args[0], "set") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let set = state.sets.entry(args[0].clone()).or_default();
                let added = args[1..].iter().filter(|m| set.insert((*m).clone())).count();
                Reply::Integer(added as i64)
            }
            "SREM" => {
                if !state.holds(&args[0], "set") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let removed = match state.sets.get_mut(&args[0]) {
                    Some(set) => {
                        let removed = i64::from(set.remove(&args[1]));
                        if set.is_empty() {
                            state.sets.remove(&args[0]);
                        }
                        removed
                    }
                    None => 0,
                };
                Reply::Integer(removed)
            }
            "SMEMBERS" => {
                if !state.holds(&args[0], "set") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let members = state
                    .sets
                    .get(&args[0])
                    .map(|set| set.iter().map(|m| Reply::bulk(m.as_str())).collect())
                    .unwrap_or_default();
                Reply::Array(members)
            }
            "SISMEMBER" => {
                if !state.holds(&args[0], "set") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let present = state
                    .sets
                    .get(&args[0])
                    .is_some_and(|set| set.contains(&args[1]));
                Reply::Integer(i64::from(present))
            }
            "HSET" => {
                if !state.holds(&args[0], "hash") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let hash = state.hashes.entry(args[0].clone()).or_default();
                let added = args[1..]
                    .chunks(2)
                    .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count();
                Reply::Integer(added as i64)
            }
            "HGET" => {
                if !state.holds(&args[0], "hash") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                state
                    .hashes
                    .get(&args[0])
                    .and_then(|hash| hash.get(&args[1]))
                    .map_or(Reply::Nil, |v| Reply::bulk(v.as_str()))
            }
            "LPUSH" => {
                if !state.holds(&args[0], "list") {
                    return Ok(Reply::Error(WRONGTYPE.into()));
                }
                let list = state.lists.entry(args[0].clone()).or_default();
                for value in &args[1..] {
                    list.push_front(value.clone());
                }
                let len = list.len() as i64;
                drop(state);
                self.shared.pushed.notify_waiters();
                Reply::Integer(len)
            }
            other => Reply::Error(format!("ERR unknown command '{}'", other)),
        };
        Ok(reply)
    }

    async fn blocking_pop(&self, command: &Command) -> Result<Reply, BrokerError> {
        let args = command.args();
        let Some((timeout, keys)) = args.split_last().filter(|(_, keys)| !keys.is_empty()) else {
            return Ok(Reply::Error(
                "ERR wrong number of arguments for 'brpop' command".into(),
            ));
        };
        let Ok(timeout) = timeout.parse::<f64>() else {
            return Ok(Reply::Error("ERR timeout is not a float or out of range".into()));
        };
        let deadline = if timeout > 0.0 {
            let deadline = Duration::try_from_secs_f64(timeout)
                .ok()
                .and_then(|wait| tokio::time::Instant::now().checked_add(wait));
            match deadline {
                Some(deadline) => Some(deadline),
                None => return Ok(Reply::Error("ERR timeout is out of range".into())),
            }
        } else if timeout == 0.0 {
            None
        } else {
            return Ok(Reply::Error("ERR timeout is negative".into()));
        };

        loop {
            let notified = self.shared.pushed.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a push between the
            // check and the await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if state.closed {
                    return Err(BrokerError::Closed);
                }
                for key in keys {
                    if !state.holds(key, "list") {
                        return Ok(Reply::Error(WRONGTYPE.into()));
                    }
                    if let Some(value) = state.pop_back(key) {
                        return Ok(Reply::Array(vec![
                            Reply::bulk(key.as_str()),
                            Reply::bulk(value),
                        ]));
                    }
                }
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Reply::Nil);
                    }
                }
            }
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    fn implementation(&self) -> &'static str {
        "memory"
    }

    async fn open_commands(&self) -> Result<Box<dyn CommandConnection>, BrokerError> {
        if self.is_shut_down() {
            return Err(BrokerError::Connect("broker is shut down".into()));
        }
        Ok(Box::new(MemoryCommandConnection {
            broker: self.clone(),
        }))
    }

    async fn open_subscriptions(&self) -> Result<SubscriptionConnection, BrokerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(BrokerError::Connect("broker is shut down".into()));
            }
            state.subscribers.insert(
                id,
                Subscriber {
                    channels: HashSet::new(),
                    patterns: HashSet::new(),
                    tx,
                },
            );
        }
        Ok(SubscriptionConnection {
            sink: Box::new(MemorySubscriptionSink {
                broker: self.clone(),
                id,
            }),
            messages: UnboundedReceiverStream::new(rx).boxed(),
        })
    }
}

struct MemoryCommandConnection {
    broker: InMemoryBroker,
}

#[async_trait]
impl CommandConnection for MemoryCommandConnection {
    async fn execute(&mut self, command: &Command) -> Result<Reply, BrokerError> {
        if command.is_blocking() {
            self.broker.blocking_pop(command).await
        } else {
            self.broker.apply(command)
        }
    }
}

struct MemorySubscriptionSink {
    broker: InMemoryBroker,
    id: u64,
}

impl MemorySubscriptionSink {
    fn update(&self, f: impl FnOnce(&mut Subscriber)) -> Result<(), BrokerError> {
        let mut state = self.broker.shared.state.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let subscriber = state.subscribers.get_mut(&self.id).ok_or(BrokerError::Closed)?;
        f(subscriber);
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSink for MemorySubscriptionSink {
    async fn subscribe(&mut self, channel: &str) -> Result<(), BrokerError> {
        self.update(|sub| {
            sub.channels.insert(channel.to_string());
        })
    }

    async fn psubscribe(&mut self, pattern: &str) -> Result<(), BrokerError> {
        self.update(|sub| {
            sub.patterns.insert(pattern.to_string());
        })
    }
}
