//! Completion Registry.
//!
//! Binds a typed completion to every outstanding broker operation.
//!
//! Flow:
//! 1. An operation calls `register()` with its callback and gets a handle
//! 2. The transport executes the command and queues the reply for the reactor
//! 3. The reactor calls `complete()`, which removes the entry, checks the
//!    reply shape and invokes the callback
//!
//! An entry is removed before its callback runs, so a completion can fire at
//! most once. Entries whose reply never arrives stay registered until
//! `abandon_all()` runs on a fatal transport error.

use crate::domain::{FromReply, MalformedReply, MalformedReplyPolicy, Reply};
use crate::error::{ApidError, ApidResult};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Boxed user callback for an operation producing `T`.
pub type Callback<T> = Box<dyn FnOnce(ApidResult<T>) + Send>;

type Deliver = Box<dyn FnOnce(Reply, MalformedReplyPolicy) -> Result<(), MalformedReply> + Send>;

/// Identifies one submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationHandle(u64);

impl OperationHandle {
    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

struct PendingOperation {
    command: &'static str,
    submitted_at: Instant,
    // Completions are only `Send`; the mutex makes the map `Sync`.
    deliver: Mutex<Deliver>,
}

/// What happened to a reply handed to [`CompletionRegistry::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Converted and passed to the callback (or to the no-op default).
    Delivered,
    /// Wrong shape. Passed to the callback as an error only under the
    /// `surface` policy.
    Malformed(MalformedReply),
    /// No such pending operation.
    Unknown,
}

/// Registry counters.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub total_submitted: AtomicU64,
    pub total_completed: AtomicU64,
    /// Malformed replies, whatever the policy did with them.
    pub total_malformed: AtomicU64,
    /// Operations released without a reply after a fatal error.
    pub total_abandoned: AtomicU64,
}

/// Pending operations keyed by handle.
pub struct CompletionRegistry {
    pending: DashMap<OperationHandle, PendingOperation>,
    next_handle: AtomicU64,
    policy: MalformedReplyPolicy,
    stats: RegistryStats,
}

impl CompletionRegistry {
    pub fn new(policy: MalformedReplyPolicy) -> Self {
        Self {
            pending: DashMap::new(),
            next_handle: AtomicU64::new(1),
            policy,
            stats: RegistryStats::default(),
        }
    }

    /// Register an operation. Without a callback a no-op completion is
    /// recorded, so the reply is still validated and the entry released.
    pub fn register<T: FromReply>(
        &self,
        command: &'static str,
        callback: Option<Callback<T>>,
    ) -> OperationHandle {
        let handle = OperationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        let deliver: Deliver = Box::new(move |reply, policy| match T::from_reply(reply) {
            Ok(value) => {
                if let Some(callback) = callback {
                    callback(Ok(value));
                }
                Ok(())
            }
            Err(malformed) => {
                if policy == MalformedReplyPolicy::Surface {
                    if let Some(callback) = callback {
                        callback(Err(ApidError::MalformedReply {
                            command,
                            reply: malformed.clone(),
                        }));
                    }
                }
                Err(malformed)
            }
        });

        self.pending.insert(
            handle,
            PendingOperation {
                command,
                submitted_at: Instant::now(),
                deliver: Mutex::new(deliver),
            },
        );
        self.stats.total_submitted.fetch_add(1, Ordering::Relaxed);

        debug!(handle = %handle, command = command, "Registered pending operation");
        handle
    }

    /// Complete an operation with its reply.
    pub fn complete(&self, handle: OperationHandle, reply: Reply) -> CompletionOutcome {
        let Some((_, pending)) = self.pending.remove(&handle) else {
            warn!(handle = %handle, "Reply for unknown operation");
            return CompletionOutcome::Unknown;
        };

        let elapsed = pending.submitted_at.elapsed();
        let deliver = pending.deliver.into_inner();
        match deliver(reply, self.policy) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    handle = %handle,
                    command = pending.command,
                    elapsed_us = elapsed.as_micros() as u64,
                    "Completed operation"
                );
                CompletionOutcome::Delivered
            }
            Err(malformed) => {
                self.stats.total_malformed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    handle = %handle,
                    command = pending.command,
                    policy = ?self.policy,
                    error = %malformed,
                    "Malformed reply"
                );
                CompletionOutcome::Malformed(malformed)
            }
        }
    }

    /// Release an operation whose command never reached the broker.
    pub fn forget(&self, handle: OperationHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    /// Release every pending operation without invoking it.
    ///
    /// Returns the number of operations released.
    pub fn abandon_all(&self) -> usize {
        let mut abandoned = 0;
        self.pending.retain(|handle, pending| {
            warn!(
                handle = %handle,
                command = pending.command,
                waited_ms = pending.submitted_at.elapsed().as_millis() as u64,
                "Abandoning pending operation"
            );
            abandoned += 1;
            false
        });
        self.stats
            .total_abandoned
            .fetch_add(abandoned as u64, Ordering::Relaxed);
        abandoned
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: OperationHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}
