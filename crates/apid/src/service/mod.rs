//! Service Layer
//!
//! The [`Apid`] client and the operations it offers:
//!
//! - `actions` - broadcast handlers and their invocation
//! - `methods` - request/reply over publish plus a one-shot reply queue
//! - `collections` - key/value, set and hash façade
//! - `pubsub` - raw publish and subscribe passthrough

mod actions;
mod client;
mod collections;
mod methods;
mod pubsub;
mod routing;

pub use client::{Apid, StopHandle};

use crate::error::ApidResult;
use crate::registry::Callback;

/// `None` for an operation's optional callback, with the type spelled out.
///
/// ```ignore
/// apid.kv_set("key", "value", no_callback::<()>())?;
/// ```
pub fn no_callback<T>() -> Option<fn(ApidResult<T>)> {
    None
}

fn boxed<T, F>(callback: Option<F>) -> Option<Callback<T>>
where
    F: FnOnce(ApidResult<T>) + Send + 'static,
{
    callback.map(|f| Box::new(f) as Callback<T>)
}
