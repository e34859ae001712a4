//! Adapters Layer (Driven Adapters)
//!
//! Broker implementations behind the [`crate::ports::Broker`] port:
//!
//! - `RedisBroker` - networked broker over unix socket or TCP
//! - `InMemoryBroker` - in-process broker with the same command vocabulary

pub mod memory_broker;
#[cfg(feature = "redis")]
pub mod redis_broker;

pub use memory_broker::InMemoryBroker;
#[cfg(feature = "redis")]
pub use redis_broker::RedisBroker;
