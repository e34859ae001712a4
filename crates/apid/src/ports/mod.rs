//! Ports Layer
//!
//! Trait definitions for the driven side: the broker the client talks to.

pub mod broker;

pub use broker::{
    Broker, BrokerError, BrokerMessage, CommandConnection, SubscriptionConnection,
    SubscriptionSink,
};
