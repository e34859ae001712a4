//! # apid
//!
//! RPC over a message broker. Processes expose named **actions**
//! (fire-and-forget broadcast handlers) and **methods** (request/reply
//! handlers) and invoke each other's, using nothing but the broker's own
//! primitives: publish/subscribe, pattern subscribe, key/value, sets, hashes
//! and a blocking-pop queue.
//!
//! ## Architecture
//!
//! Hexagonal layout (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): commands, replies, addresses, config,
//!   correlation ids and reply tickets. No I/O.
//! - **Ports Layer** (`ports/`): the `Broker` trait and its connections.
//! - **Adapters Layer** (`adapters/`): `RedisBroker` (feature `redis`) and
//!   `InMemoryBroker`.
//! - **Transport** (`transport.rs`): command, subscription and blocking
//!   connections feeding one event queue.
//! - **Completion Registry** (`registry.rs`): one typed completion per
//!   outstanding operation, invoked at most once.
//! - **Service Layer** (`service/`): the `Apid` client, its reactor and the
//!   action, method, collection and pub/sub operations.
//!
//! ## Execution model
//!
//! Operations return as soon as the command is queued. Completions and
//! handlers run one at a time inside [`Apid::start`], which returns after
//! [`Apid::stop`] or with a fatal [`ApidError::Transport`].
//!
//! ## Usage Example
//!
//! ```ignore
//! use apid::{no_callback, Apid, ApidConfig};
//!
//! let apid = Apid::connect(ApidConfig::from_env()?).await?;
//!
//! apid.register_method("echo", |apid, payload, ticket| {
//!     let _ = apid.reply(ticket, payload);
//! })?;
//!
//! let stop = apid.stop_handle();
//! apid.invoke_method("echo", "ping", Some(move |reply| {
//!     println!("{:?}", reply);
//!     stop.stop();
//! }))?;
//!
//! apid.start().await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod registry;
pub mod service;
mod transport;

// Re-exports for convenience
pub use adapters::InMemoryBroker;
#[cfg(feature = "redis")]
pub use adapters::RedisBroker;
pub use domain::{
    ApidConfig, BrokerAddress, CorrelationStrategy, MalformedReplyPolicy, ReplyTicket, SetEntry,
    Wait,
};
pub use error::{ApidError, ApidResult, ConnectionRole};
pub use ports::{Broker, BrokerError};
pub use registry::{OperationHandle, RegistryStats};
pub use service::{no_callback, Apid, StopHandle};
