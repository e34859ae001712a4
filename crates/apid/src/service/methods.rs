//! Method Channel: request/reply built from publish, pattern subscribe,
//! push and blocking pop.
//!
//! A call to method `m` picks a correlation `c` and publishes the request on
//! `m@c`. Handlers are pattern-subscribed to `m@*`; the one that answers
//! pushes its reply onto the list `m@c`, where the caller is blocked in
//! `BRPOP`. Calls without a callback share the destination `m@ignore`.

use super::routing::{MethodHandler, PatternRoute};
use super::Apid;
use crate::domain::{
    method_pattern, reply_destination, Command, Popped, ReplyTicket, Wait, IGNORE_CORRELATION,
};
use crate::error::{ApidError, ApidResult};
use crate::registry::{Callback, OperationHandle};
use std::sync::Arc;
use tracing::{debug, info};

impl Apid {
    /// Serve method `name`. The handler must answer each request by passing
    /// its ticket to [`Apid::reply`].
    ///
    /// When several processes serve the same method they all receive every
    /// request; the first reply wins and later ones stay queued unread.
    pub fn register_method<H>(&self, name: &str, handler: H) -> ApidResult<()>
    where
        H: Fn(&Apid, &str, ReplyTicket) + Send + Sync + 'static,
    {
        let pattern = method_pattern(name);
        let handler: MethodHandler = Arc::new(handler);
        if self.inner.routes.add_pattern(&pattern, PatternRoute::Method(handler)) {
            self.inner.transport.psubscribe(&pattern)?;
        }
        info!(method = %name, pattern = %pattern, "Registered method");
        Ok(())
    }

    /// Answer a method request.
    pub fn reply(&self, ticket: ReplyTicket, content: &str) -> ApidResult<OperationHandle> {
        let destination = ticket.consume();
        debug!(destination = %destination, "Replying");
        self.submit::<()>(Command::lpush(&destination, content), None)
    }

    /// Call method `name` and wait for its reply as long as it takes.
    pub fn invoke_method<F>(
        &self,
        name: &str,
        payload: &str,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<String>) + Send + 'static,
    {
        self.invoke_method_with_wait(name, payload, Wait::Forever, callback)
    }

    /// Call method `name`. With [`Wait::For`] the callback receives
    /// [`ApidError::Timeout`] if no reply arrives in time.
    pub fn invoke_method_with_wait<F>(
        &self,
        name: &str,
        payload: &str,
        wait: Wait,
        callback: Option<F>,
    ) -> ApidResult<OperationHandle>
    where
        F: FnOnce(ApidResult<String>) + Send + 'static,
    {
        let destination = if callback.is_some() {
            reply_destination(name, self.inner.correlation.next_id().as_str())
        } else {
            reply_destination(name, IGNORE_CORRELATION)
        };
        debug!(method = %name, destination = %destination, wait = ?wait, "Invoking method");

        self.submit::<()>(Command::publish(&destination, payload), None)?;

        let completion = callback.map(|callback| {
            let destination = destination.clone();
            Box::new(move |popped: ApidResult<Popped>| {
                callback(popped.and_then(|popped| match popped {
                    Popped::Value(value) => Ok(value),
                    Popped::TimedOut => Err(ApidError::Timeout { destination }),
                }))
            }) as Callback<Popped>
        });
        self.submit(Command::brpop(&destination, wait), completion)
    }
}

#[cfg(test)]
mod tests {
    use crate::adapters::InMemoryBroker;
    use crate::domain::{ApidConfig, CorrelationStrategy, Wait};
    use crate::error::{ApidError, ApidResult};
    use crate::service::{no_callback, Apid};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn client(broker: &InMemoryBroker) -> Apid {
        Apid::connect_with(broker.clone(), ApidConfig::default())
            .await
            .unwrap()
    }

    async fn serving(broker: &InMemoryBroker, method: &str) {
        let pattern = format!("{}@*", method);
        timeout(Duration::from_secs(2), async {
            while broker.pattern_subscribers(&pattern) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("method registered");
    }

    async fn run(apid: &Apid) {
        timeout(Duration::from_secs(5), apid.start())
            .await
            .expect("reactor stopped within timeout")
            .unwrap();
    }

    #[tokio::test]
    async fn test_method_round_trip_same_process() {
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;

        apid.register_method("test2", |apid, payload, ticket| {
            apid.reply(ticket, payload).unwrap();
        })
        .unwrap();
        serving(&broker, "test2").await;

        let answer = Arc::new(Mutex::new(None));
        let sink = answer.clone();
        let stop = apid.stop_handle();
        apid.invoke_method("test2", "ping", Some(move |reply: ApidResult<String>| {
            *sink.lock() = Some(reply.unwrap());
            stop.stop();
        }))
        .unwrap();

        run(&apid).await;
        assert_eq!(answer.lock().take(), Some("ping".to_string()));
    }

    #[tokio::test]
    async fn test_ticket_carries_destination() {
        let broker = InMemoryBroker::new();
        let config = ApidConfig::default().with_correlation(CorrelationStrategy::Sequential);
        let apid = Apid::connect_with(broker.clone(), config).await.unwrap();

        let destinations = Arc::new(Mutex::new(Vec::new()));
        let sink = destinations.clone();
        apid.register_method("echo", move |apid, payload, ticket| {
            sink.lock().push((ticket.destination().to_string(), ticket.is_ignored()));
            apid.reply(ticket, payload).unwrap();
        })
        .unwrap();
        serving(&broker, "echo").await;

        apid.invoke_method("echo", "a", no_callback::<String>()).unwrap();
        let stop = apid.stop_handle();
        apid.invoke_method("echo", "b", Some(move |_: ApidResult<String>| stop.stop()))
            .unwrap();

        run(&apid).await;
        let destinations = destinations.lock();
        assert_eq!(destinations.len(), 2);
        assert_eq!(destinations[0], ("echo@ignore".to_string(), true));
        assert!(destinations[1].0.starts_with("echo@"));
        assert!(!destinations[1].1);
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;

        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        let stop = apid.stop_handle();
        apid.invoke_method_with_wait(
            "absent",
            "ping",
            Wait::For(Duration::from_millis(50)),
            Some(move |reply: ApidResult<String>| {
                *sink.lock() = Some(reply);
                stop.stop();
            }),
        )
        .unwrap();

        run(&apid).await;
        let outcome = outcome.lock().take().unwrap();
        match outcome {
            Err(ApidError::Timeout { destination }) => assert!(destination.starts_with("absent@")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(apid.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_very_long_wait_still_answered() {
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;

        apid.register_method("m", |apid, payload, ticket| {
            apid.reply(ticket, payload).unwrap();
        })
        .unwrap();
        serving(&broker, "m").await;

        let answer = Arc::new(Mutex::new(None));
        let sink = answer.clone();
        let stop = apid.stop_handle();
        apid.invoke_method_with_wait(
            "m",
            "x",
            Wait::For(Duration::from_secs(u64::MAX / 2)),
            Some(move |reply: ApidResult<String>| {
                *sink.lock() = Some(reply.unwrap());
                stop.stop();
            }),
        )
        .unwrap();

        run(&apid).await;
        assert_eq!(answer.lock().take(), Some("x".to_string()));
        assert_eq!(apid.pending_operations(), 0);
    }

    #[tokio::test]
    async fn test_unanswered_call_stays_pending() {
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;

        apid.invoke_method("absent", "ping", Some(|_: ApidResult<String>| {}))
            .unwrap();
        let stop = apid.stop_handle();
        apid.kv_get("sync", move |_| stop.stop()).unwrap();

        run(&apid).await;
        assert_eq!(apid.pending_operations(), 1);
    }
}
