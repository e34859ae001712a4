//! # Failure Flows
//!
//! Losing the broker is fatal: the reactor returns a transport error and
//! pending callbacks are never invoked with partial results.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use apid::{ApidError, ApidResult, InMemoryBroker};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_broker_loss_stops_every_client() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let server = client(&broker).await;
        server
            .register_method("slow", |_, _, ticket| {
                // Never answered.
                drop(ticket);
            })
            .unwrap();
        let server_reactor = spawn_reactor(&server);

        let caller = client(&broker).await;
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = invoked.clone();
        caller
            .invoke_method("slow", "work", Some(move |_: ApidResult<String>| {
                flag.store(true, Ordering::SeqCst);
            }))
            .unwrap();

        let killer = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            killer.shutdown();
        });

        let err = run_until_stopped(&caller).await.unwrap_err();
        assert!(matches!(err, ApidError::Transport { .. }));
        assert!(!invoked.load(Ordering::SeqCst));
        assert_eq!(caller.pending_operations(), 0);

        let err = join_reactor(server_reactor).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_operations_after_failure_do_not_run() {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let apid = client(&broker).await;
        broker.shutdown();

        assert!(run_until_stopped(&apid).await.is_err());
        assert!(matches!(apid.start().await, Err(ApidError::Shutdown)));
    }
}
