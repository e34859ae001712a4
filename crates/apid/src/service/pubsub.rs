//! Raw publish/subscribe passthrough.

use super::routing::{ChannelHandler, PatternHandler, PatternRoute};
use super::{boxed, Apid};
use crate::domain::Command;
use crate::error::ApidResult;
use crate::registry::OperationHandle;
use std::sync::Arc;
use tracing::debug;

impl Apid {
    /// `PUBLISH channel payload`. Reports how many subscribers received it.
    pub fn publish<F>(
        &self,
        channel: &str,
        payload: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<i64>) + Send + 'static,
    {
        self.submit(Command::publish(channel, payload), boxed(callback))
    }

    /// Run `handler(payload)` for every message on `channel`.
    pub fn subscribe<H>(&self, channel: &str, handler: H) -> ApidResult<()>
    where
        H: Fn(&Apid, &str) + Send + Sync + 'static,
    {
        let handler: ChannelHandler = Arc::new(handler);
        if self.inner.routes.add_channel(channel, handler) {
            self.inner.transport.subscribe(channel)?;
        }
        debug!(channel = %channel, "Subscribed");
        Ok(())
    }

    /// Run `handler(channel, payload)` for every message on a channel
    /// matching the glob `pattern`.
    pub fn subscribe_pattern<H>(&self, pattern: &str, handler: H) -> ApidResult<()>
    where
        H: Fn(&Apid, &str, &str) + Send + Sync + 'static,
    {
        let handler: PatternHandler = Arc::new(handler);
        if self.inner.routes.add_pattern(pattern, PatternRoute::Raw(handler)) {
            self.inner.transport.psubscribe(pattern)?;
        }
        debug!(pattern = %pattern, "Subscribed to pattern");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::adapters::InMemoryBroker;
    use crate::domain::ApidConfig;
    use crate::service::{no_callback, Apid};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_pattern_subscription_sees_channel() {
        let broker = InMemoryBroker::new();
        let apid = Apid::connect_with(broker.clone(), ApidConfig::default())
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        apid.subscribe_pattern("sensor.*", move |apid, channel, payload| {
            let mut seen = sink.lock();
            seen.push((channel.to_string(), payload.to_string()));
            if seen.len() == 2 {
                apid.stop();
            }
        })
        .unwrap();
        timeout(Duration::from_secs(2), async {
            while broker.pattern_subscribers("sensor.*") == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        apid.publish("sensor.a", "1", no_callback::<i64>()).unwrap();
        apid.publish("other", "x", no_callback::<i64>()).unwrap();
        apid.publish("sensor.b", "2", no_callback::<i64>()).unwrap();

        timeout(Duration::from_secs(5), apid.start()).await.unwrap().unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                ("sensor.a".to_string(), "1".to_string()),
                ("sensor.b".to_string(), "2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_utf8_payload_is_dropped() {
        use crate::ports::BrokerMessage;

        let broker = InMemoryBroker::new();
        let apid = Apid::connect_with(broker, ApidConfig::default())
            .await
            .unwrap();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let sink = hits.clone();
        apid.subscribe("raw", move |apid, payload| {
            sink.lock().push(payload.to_string());
            apid.stop();
        })
        .unwrap();

        let invalid = BrokerMessage::message("raw", vec![0xff, 0xfe]);
        let routed = apid.inner.routes.route(&apid, invalid);
        assert_eq!(routed, 0);
        let routed = apid.inner.routes.route(&apid, BrokerMessage::message("raw", "ok"));
        assert_eq!(routed, 1);
        assert_eq!(*hits.lock(), vec!["ok".to_string()]);
    }
}
