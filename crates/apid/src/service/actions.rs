//! Action Channel: named broadcast handlers.

use super::routing::ChannelHandler;
use super::{boxed, Apid};
use crate::domain::Command;
use crate::error::ApidResult;
use crate::registry::OperationHandle;
use std::sync::Arc;
use tracing::info;

impl Apid {
    /// Run `handler` for every message published on channel `name`.
    ///
    /// Registrations last as long as the client. Every subscribed process
    /// receives every message; nothing is queued for absent subscribers.
    pub fn register_action<H>(&self, name: &str, handler: H) -> ApidResult<()>
    where
        H: Fn(&Apid, &str) + Send + Sync + 'static,
    {
        let handler: ChannelHandler = Arc::new(handler);
        if self.inner.routes.add_channel(name, handler) {
            self.inner.transport.subscribe(name)?;
        }
        info!(action = %name, "Registered action");
        Ok(())
    }

    /// Publish `payload` to action `name`.
    ///
    /// The callback reports the broker's acknowledgement: the number of
    /// subscribers the message reached, which may be zero.
    pub fn invoke_action<F>(
        &self,
        name: &str,
        payload: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::publish(name, payload), boxed(callback))
    }
}
