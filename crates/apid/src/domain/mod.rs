//! Domain Layer
//!
//! Pure types and logic with no I/O: addresses, commands, replies,
//! correlation ids, reply tickets, channel patterns and configuration.

pub mod address;
pub mod command;
pub mod config;
pub mod correlation;
pub mod pattern;
pub mod reply;
pub mod ticket;

pub use address::{AddressError, BrokerAddress, DEFAULT_ADDRESS};
pub use command::{Command, ReplyShape, Wait};
pub use config::{ApidConfig, ConfigError, MalformedReplyPolicy, DEFAULT_EVENT_CAPACITY};
pub use correlation::{CorrelationId, CorrelationSource, CorrelationStrategy};
pub use pattern::glob_match;
pub use reply::{FromReply, MalformedReply, Popped, Reply, SetEntry};
pub use ticket::{method_pattern, reply_destination, ReplyTicket, IGNORE_CORRELATION};
