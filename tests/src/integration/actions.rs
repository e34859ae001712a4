//! # Action Flows
//!
//! Broadcast delivery between independent clients:
//!
//! 1. **Round-trip**: a published action reaches a peer's handler
//! 2. **Fan-out**: every subscribed client receives every message
//! 3. **No subscriber**: publishing to nobody is acknowledged with zero

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use apid::{no_callback, ApidResult, InMemoryBroker};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_action_reaches_peer() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let server = client(&broker).await;
        let caller = client(&broker).await;

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        server
            .register_action("test1", move |apid, payload| {
                sink.lock().push(payload.to_string());
                apid.stop();
            })
            .unwrap();
        wait_until(|| broker.channel_subscribers("test1") == 1).await;
        let reactor = spawn_reactor(&server);

        let stop = caller.stop_handle();
        caller
            .invoke_action("test1", "test from client", Some(move |ack: ApidResult<i64>| {
                assert_eq!(ack.unwrap(), 1);
                stop.stop();
            }))
            .unwrap();
        run_until_stopped(&caller).await.unwrap();

        join_reactor(reactor).await.unwrap();
        assert_eq!(*received.lock(), vec!["test from client".to_string()]);
    }

    #[tokio::test]
    async fn test_action_fans_out_to_every_subscriber() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let caller = client(&broker).await;

        let received = Arc::new(Mutex::new(Vec::new()));
        let mut reactors = Vec::new();
        for id in 0..3 {
            let server = client(&broker).await;
            let sink = received.clone();
            server
                .register_action("announce", move |apid, payload| {
                    sink.lock().push((id, payload.to_string()));
                    apid.stop();
                })
                .unwrap();
            reactors.push(spawn_reactor(&server));
        }
        wait_until(|| broker.channel_subscribers("announce") == 3).await;

        let stop = caller.stop_handle();
        caller
            .invoke_action("announce", "hello", Some(move |ack: ApidResult<i64>| {
                assert_eq!(ack.unwrap(), 3);
                stop.stop();
            }))
            .unwrap();
        run_until_stopped(&caller).await.unwrap();

        for reactor in reactors {
            join_reactor(reactor).await.unwrap();
        }
        let mut received = received.lock().clone();
        received.sort();
        assert_eq!(
            received,
            vec![
                (0, "hello".to_string()),
                (1, "hello".to_string()),
                (2, "hello".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_action_without_subscribers_is_a_no_op() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let caller = client(&broker).await;
        let bystander = client(&broker).await;

        let stray = Arc::new(Mutex::new(0));
        let sink = stray.clone();
        bystander
            .register_action("elsewhere", move |_, _| *sink.lock() += 1)
            .unwrap();

        caller.invoke_action("nobody", "hello", no_callback::<i64>()).unwrap();
        let stop = caller.stop_handle();
        caller
            .publish("nobody", "again", Some(move |ack: ApidResult<i64>| {
                assert_eq!(ack.unwrap(), 0);
                stop.stop();
            }))
            .unwrap();

        run_until_stopped(&caller).await.unwrap();
        assert_eq!(*stray.lock(), 0);
        assert_eq!(caller.pending_operations(), 0);
    }
}
