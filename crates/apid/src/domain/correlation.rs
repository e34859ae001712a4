//! Correlation identifiers for method invocations.
//!
//! A correlation id only ever becomes part of an ephemeral channel/queue name
//! (`<method>@<id>`), so it must be short and free of the `@` separator.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Length of every generated correlation id.
pub const CORRELATION_ID_LEN: usize = 16;

/// How correlation ids are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrategy {
    /// 16 random alphanumeric characters. No collision check is made.
    #[default]
    Random,
    /// Per-instance prefix plus a monotonic counter; unique within the
    /// lifetime of one client and, with overwhelming probability, across
    /// clients.
    Sequential,
}

impl FromStr for CorrelationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "sequential" => Ok(Self::Sequential),
            other => Err(format!("unknown correlation strategy: {}", other)),
        }
    }
}

/// Correlation id of one method invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a random alphanumeric id.
    pub fn random() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CORRELATION_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Produces correlation ids according to a [`CorrelationStrategy`].
#[derive(Debug)]
pub struct CorrelationSource {
    strategy: CorrelationStrategy,
    /// 8 hex characters identifying this client instance.
    instance: String,
    counter: AtomicU64,
}

impl CorrelationSource {
    pub fn new(strategy: CorrelationStrategy) -> Self {
        let instance = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            strategy,
            instance,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        match self.strategy {
            CorrelationStrategy::Random => CorrelationId::random(),
            CorrelationStrategy::Sequential => {
                // Wraps after 2^32 calls; the instance prefix keeps ids
                // distinct from other clients regardless.
                let n = self.counter.fetch_add(1, Ordering::Relaxed) & 0xffff_ffff;
                CorrelationId(format!("{}{:08x}", self.instance, n))
            }
        }
    }
}

impl Default for CorrelationSource {
    fn default() -> Self {
        Self::new(CorrelationStrategy::default())
    }
}
