//! Shared fixtures for the integration flows.

use apid::{Apid, ApidConfig, ApidResult, InMemoryBroker};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Upper bound for any single flow step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Route client logs to the test output. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A fresh client ("process") on the shared broker.
pub async fn client(broker: &InMemoryBroker) -> Apid {
    Apid::connect_with(broker.clone(), ApidConfig::default())
        .await
        .expect("connect to in-memory broker")
}

/// Run a client's reactor in the background.
pub fn spawn_reactor(apid: &Apid) -> JoinHandle<ApidResult<()>> {
    let apid = apid.clone();
    tokio::spawn(async move { apid.start().await })
}

/// Drive a reactor until it stops, failing the test if it never does.
pub async fn run_until_stopped(apid: &Apid) -> ApidResult<()> {
    timeout(STEP_TIMEOUT, apid.start())
        .await
        .expect("reactor did not stop in time")
}

/// Wait for a background reactor to finish.
pub async fn join_reactor(reactor: JoinHandle<ApidResult<()>>) -> ApidResult<()> {
    timeout(STEP_TIMEOUT, reactor)
        .await
        .expect("reactor did not stop in time")
        .expect("reactor task panicked")
}

/// Poll `condition` until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(STEP_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
