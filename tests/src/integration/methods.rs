//! # Method Flows
//!
//! Request/reply between independent clients:
//!
//! 1. **Peer round-trip**: a caller gets the reply produced by another client
//! 2. **Sequential calls**: each call gets its own reply destination
//! 3. **Duplicate repliers**: the first reply wins, the rest stay queued
//! 4. **Bounded wait**: an unserved method times out only when asked to

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use apid::{Apid, ApidError, ApidResult, InMemoryBroker, Wait};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    async fn echo_server(broker: &InMemoryBroker, method: &str) -> Apid {
        let server = client(broker).await;
        server
            .register_method(method, |apid, payload, ticket| {
                apid.reply(ticket, payload).unwrap();
            })
            .unwrap();
        let pattern = format!("{}@*", method);
        wait_until(|| broker.pattern_subscribers(&pattern) >= 1).await;
        server
    }

    #[tokio::test]
    async fn test_method_round_trip_between_peers() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let server = echo_server(&broker, "test2").await;
        let reactor = spawn_reactor(&server);
        let caller = client(&broker).await;

        let reply = Arc::new(Mutex::new(None));
        let sink = reply.clone();
        let stop = caller.stop_handle();
        caller
            .invoke_method("test2", "test2 from client", Some(move |r: ApidResult<String>| {
                *sink.lock() = Some(r.unwrap());
                stop.stop();
            }))
            .unwrap();
        run_until_stopped(&caller).await.unwrap();

        server.stop();
        join_reactor(reactor).await.unwrap();
        assert_eq!(reply.lock().take(), Some("test2 from client".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_calls_get_their_own_replies() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let server = echo_server(&broker, "echo").await;
        let reactor = spawn_reactor(&server);
        let caller = client(&broker).await;

        let replies = Arc::new(Mutex::new(Vec::new()));
        for n in 0..5 {
            let sink = replies.clone();
            let stop = caller.stop_handle();
            caller
                .invoke_method("echo", &format!("call-{}", n), Some(move |r: ApidResult<String>| {
                    let mut replies = sink.lock();
                    replies.push((n, r.unwrap()));
                    if replies.len() == 5 {
                        stop.stop();
                    }
                }))
                .unwrap();
        }
        run_until_stopped(&caller).await.unwrap();

        server.stop();
        join_reactor(reactor).await.unwrap();
        for (n, reply) in replies.lock().iter() {
            assert_eq!(reply, &format!("call-{}", n));
        }
    }

    #[tokio::test]
    async fn test_duplicate_repliers_first_reply_wins() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let destinations = Arc::new(Mutex::new(Vec::new()));

        let mut servers = Vec::new();
        for id in 0..2 {
            let server = client(&broker).await;
            let sink = destinations.clone();
            server
                .register_method("standby", move |apid, _, ticket| {
                    sink.lock().push(ticket.destination().to_string());
                    apid.reply(ticket, &format!("server-{}", id)).unwrap();
                })
                .unwrap();
            servers.push(server);
        }
        wait_until(|| broker.pattern_subscribers("standby@*") == 2).await;
        let reactors: Vec<_> = servers.iter().map(spawn_reactor).collect();

        let caller = client(&broker).await;
        let reply = Arc::new(Mutex::new(None));
        let sink = reply.clone();
        let stop = caller.stop_handle();
        caller
            .invoke_method("standby", "who", Some(move |r: ApidResult<String>| {
                *sink.lock() = Some(r.unwrap());
                stop.stop();
            }))
            .unwrap();
        run_until_stopped(&caller).await.unwrap();

        // Both servers answered the same destination; one reply was consumed.
        wait_until(|| destinations.lock().len() == 2).await;
        let destination = destinations.lock()[0].clone();
        assert_eq!(destinations.lock()[1], destination);
        wait_until(|| broker.list_len(&destination) == 1).await;

        let reply = reply.lock().take().unwrap();
        assert!(reply == "server-0" || reply == "server-1");

        for (server, reactor) in servers.iter().zip(reactors) {
            server.stop();
            join_reactor(reactor).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_bounded_wait_without_server() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let caller = client(&broker).await;

        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        let stop = caller.stop_handle();
        caller
            .invoke_method_with_wait(
                "unserved",
                "hello",
                Wait::For(Duration::from_millis(20)),
                Some(move |r: ApidResult<String>| {
                    *sink.lock() = Some(r);
                    stop.stop();
                }),
            )
            .unwrap();
        run_until_stopped(&caller).await.unwrap();

        assert!(matches!(
            outcome.lock().take(),
            Some(Err(ApidError::Timeout { .. }))
        ));
    }
}
