//! Routes subscription messages to registered handlers.

use super::Apid;
use crate::domain::{MalformedReplyPolicy, ReplyTicket};
use crate::ports::BrokerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type ChannelHandler = Arc<dyn Fn(&Apid, &str) + Send + Sync>;
pub(crate) type MethodHandler = Arc<dyn Fn(&Apid, &str, ReplyTicket) + Send + Sync>;
pub(crate) type PatternHandler = Arc<dyn Fn(&Apid, &str, &str) + Send + Sync>;

#[derive(Clone)]
pub(crate) enum PatternRoute {
    /// Method requests: each delivery gets a reply ticket for its channel.
    Method(MethodHandler),
    /// Raw pattern subscription: handler sees `(channel, payload)`.
    Raw(PatternHandler),
}

/// Handlers keyed by exact channel and by pattern.
pub(crate) struct RoutingTable {
    channels: DashMap<String, Vec<ChannelHandler>>,
    patterns: DashMap<String, Vec<PatternRoute>>,
    policy: MalformedReplyPolicy,
}

impl RoutingTable {
    pub(crate) fn new(policy: MalformedReplyPolicy) -> Self {
        Self {
            channels: DashMap::new(),
            patterns: DashMap::new(),
            policy,
        }
    }

    /// Add a channel handler. Returns true when the channel had none yet
    /// and still needs a `SUBSCRIBE`.
    pub(crate) fn add_channel(&self, channel: &str, handler: ChannelHandler) -> bool {
        let mut entry = self.channels.entry(channel.to_string()).or_default();
        entry.push(handler);
        entry.len() == 1
    }

    /// Add a pattern route. Returns true when the pattern needs a
    /// `PSUBSCRIBE`.
    pub(crate) fn add_pattern(&self, pattern: &str, route: PatternRoute) -> bool {
        let mut entry = self.patterns.entry(pattern.to_string()).or_default();
        entry.push(route);
        entry.len() == 1
    }

    /// Invoke every handler the message is addressed to. Returns how many
    /// ran.
    pub(crate) fn route(&self, apid: &Apid, message: BrokerMessage) -> usize {
        let BrokerMessage {
            pattern,
            channel,
            payload,
        } = message;

        let payload = match String::from_utf8(payload) {
            Ok(payload) => payload,
            Err(_) => {
                match self.policy {
                    MalformedReplyPolicy::Drop => {
                        debug!(channel = %channel, "Dropping non-UTF-8 message")
                    }
                    MalformedReplyPolicy::Surface => {
                        warn!(channel = %channel, "Dropping non-UTF-8 message")
                    }
                }
                return 0;
            }
        };

        // Handlers are cloned out so they can register more handlers.
        match pattern {
            Some(pattern) => {
                let routes = self
                    .patterns
                    .get(&pattern)
                    .map(|routes| routes.clone())
                    .unwrap_or_default();
                if routes.is_empty() {
                    debug!(pattern = %pattern, channel = %channel, "No route for pattern message");
                }
                for route in &routes {
                    match route {
                        PatternRoute::Method(handler) => {
                            debug!(destination = %channel, "Dispatching method request");
                            handler(apid, &payload, ReplyTicket::new(channel.clone()));
                        }
                        PatternRoute::Raw(handler) => handler(apid, &channel, &payload),
                    }
                }
                routes.len()
            }
            None => {
                let handlers = self
                    .channels
                    .get(&channel)
                    .map(|handlers| handlers.clone())
                    .unwrap_or_default();
                if handlers.is_empty() {
                    debug!(channel = %channel, "No route for message");
                }
                for handler in &handlers {
                    handler(apid, &payload);
                }
                handlers.len()
            }
        }
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}
