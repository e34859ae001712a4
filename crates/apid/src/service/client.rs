//! The client context and its reactor.

use super::routing::RoutingTable;
use crate::domain::{ApidConfig, Command, CorrelationSource, FromReply};
use crate::error::{ApidError, ApidResult};
use crate::ports::Broker;
use crate::registry::{Callback, CompletionRegistry, OperationHandle, RegistryStats};
use crate::transport::{ReactorEvent, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tracing::{debug, error, info};

/// A connected client.
///
/// Cheap to clone; clones share the connections, registrations and pending
/// operations. Operations may be issued from any task. Completions and
/// handlers only run while [`Apid::start`] is being awaited, one at a time.
#[derive(Clone)]
pub struct Apid {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) config: ApidConfig,
    pub(super) transport: Transport,
    pub(super) registry: CompletionRegistry,
    pub(super) routes: RoutingTable,
    pub(super) correlation: CorrelationSource,
    /// Held by the running reactor; released when `start()` returns or its
    /// future is dropped.
    events: AsyncMutex<mpsc::Receiver<ReactorEvent>>,
    stop: Arc<StopSignal>,
    failed: AtomicBool,
}

#[derive(Debug, Default)]
struct StopSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn reset(&self) {
        self.requested.store(false, Ordering::Release);
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

/// Stops a running reactor from anywhere, without holding the client.
#[derive(Debug, Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.signal.request();
    }
}

impl Apid {
    /// Connect to the broker at `config.address`.
    #[cfg(feature = "redis")]
    pub async fn connect(config: ApidConfig) -> ApidResult<Self> {
        let broker = crate::adapters::RedisBroker::new(&config.address)
            .map_err(|e| ApidError::transport(crate::error::ConnectionRole::Command, e))?;
        Self::connect_with(broker, config).await
    }

    /// Connect through an explicit broker implementation.
    pub async fn connect_with<B: Broker>(broker: B, config: ApidConfig) -> ApidResult<Self> {
        config.validate()?;
        let (transport, events) =
            Transport::connect(Arc::new(broker), config.event_capacity).await?;

        info!(
            implementation = transport.implementation(),
            address = %config.address,
            malformed_replies = ?config.malformed_replies,
            correlation = ?config.correlation,
            "[Apid] Connected"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                registry: CompletionRegistry::new(config.malformed_replies),
                routes: RoutingTable::new(config.malformed_replies),
                correlation: CorrelationSource::new(config.correlation),
                transport,
                events: AsyncMutex::new(events),
                stop: Arc::new(StopSignal::default()),
                failed: AtomicBool::new(false),
                config,
            }),
        })
    }

    /// Run the reactor until [`Apid::stop`] is called.
    ///
    /// Returns `Ok(())` after a stop. A transport failure ends the reactor
    /// with [`ApidError::Transport`]; pending operations are then released
    /// without invoking their callbacks and the client cannot be restarted.
    pub async fn start(&self) -> ApidResult<()> {
        if self.inner.failed.load(Ordering::Acquire) {
            return Err(ApidError::Shutdown);
        }
        let mut events = self
            .inner
            .events
            .try_lock()
            .map_err(|_| ApidError::AlreadyRunning)?;

        self.inner.stop.reset();
        info!("[Apid] Reactor started");

        let result = self.run(&mut events).await;
        match &result {
            Ok(()) => info!("[Apid] Reactor stopped"),
            Err(e) => {
                self.inner.failed.store(true, Ordering::Release);
                let abandoned = self.inner.registry.abandon_all();
                error!(error = %e, abandoned = abandoned, "[Apid] Reactor failed");
            }
        }
        result
    }

    async fn run(&self, events: &mut mpsc::Receiver<ReactorEvent>) -> ApidResult<()> {
        loop {
            if self.inner.stop.is_requested() {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = self.inner.stop.notify.notified() => {}
                event = events.recv() => match event {
                    Some(event) => self.dispatch(event)?,
                    None => return Err(ApidError::Shutdown),
                },
            }
        }
    }

    fn dispatch(&self, event: ReactorEvent) -> ApidResult<()> {
        match event {
            ReactorEvent::Completed { handle, reply } => {
                self.inner.registry.complete(handle, reply);
            }
            ReactorEvent::Delivered(message) => {
                self.inner.routes.route(self, message);
            }
            ReactorEvent::Failed { role, error } => {
                return Err(ApidError::transport(role, error));
            }
        }
        Ok(())
    }

    /// Ask the reactor to return from [`Apid::start`]. The callback being
    /// run finishes first. Has no effect before `start()`.
    pub fn stop(&self) {
        self.inner.stop.request();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: self.inner.stop.clone(),
        }
    }

    /// Name of the broker implementation in use (`"redis"`, `"memory"`).
    pub fn underlying_impl(&self) -> &'static str {
        self.inner.transport.implementation()
    }

    pub fn config(&self) -> &ApidConfig {
        &self.inner.config
    }

    /// Operations submitted but not yet completed.
    pub fn pending_operations(&self) -> usize {
        self.inner.registry.pending_count()
    }

    pub fn stats(&self) -> &RegistryStats {
        self.inner.registry.stats()
    }

    /// Register the completion, then queue the command.
    pub(super) fn submit<T: FromReply>(
        &self,
        command: Command,
        callback: Option<Callback<T>>,
    ) -> ApidResult<OperationHandle> {
        let handle = self.inner.registry.register(command.name(), callback);
        debug!(handle = %handle, command = %command, "Submitting");
        if let Err(e) = self.inner.transport.submit(handle, command) {
            self.inner.registry.forget(handle);
            return Err(e);
        }
        Ok(handle)
    }
}

impl std::fmt::Debug for Apid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Apid")
            .field("implementation", &self.underlying_impl())
            .field("address", &self.inner.config.address)
            .field("pending", &self.pending_operations())
            .field("channels", &self.inner.routes.channel_count())
            .field("patterns", &self.inner.routes.pattern_count())
            .finish()
    }
}
