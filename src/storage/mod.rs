//! Product persistence.
//!
//! Records are upserted in chunks of [`BATCH_SIZE`]. Whatever the store hands
//! back as unprocessed is re-sent with a linear backoff; after the last retry
//! the leftovers are logged and the run moves on.

pub mod dynamo;

use crate::models::ProductRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Per-request item limit of BatchWriteItem.
pub const BATCH_SIZE: usize = 25;

// ── Store trait ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Fails when the target table cannot be reached.
    async fn ensure_ready(&self) -> Result<()>;

    /// Put every record; returns the ones the store did not accept.
    async fn write_batch(&self, records: Vec<ProductRecord>) -> Result<Vec<ProductRecord>>;
}

// ── Retry policy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// 1×, 2×, … `max_retries`× the base delay.
    pub fn delays(self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        (1..=self.max_retries).map(move |n| base * n)
    }
}

// ── Batch writer ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub batches: usize,
    pub written: usize,
    pub given_up: usize,
}

/// Terminal state of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    AllAccepted,
    GivenUp { unprocessed: usize },
}

struct StillUnprocessed(usize);

pub struct BatchWriter<'a> {
    store: &'a dyn ProductStore,
    policy: RetryPolicy,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn ProductStore) -> Self {
        Self { store, policy: RetryPolicy::default() }
    }

    pub fn with_policy(store: &'a dyn ProductStore, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Best effort: never fails, partial failures end up in the stats.
    pub async fn persist_all(&self, records: &[ProductRecord]) -> PersistStats {
        let mut stats = PersistStats::default();

        for (n, chunk) in records.chunks(BATCH_SIZE).enumerate() {
            stats.batches += 1;
            match self.write_chunk(chunk.to_vec()).await {
                BatchOutcome::AllAccepted => {
                    debug!("Batch {}: {} items accepted", n + 1, chunk.len());
                    stats.written += chunk.len();
                }
                BatchOutcome::GivenUp { unprocessed } => {
                    warn!(
                        "Batch {}: {} unprocessed items after {} retries",
                        n + 1,
                        unprocessed,
                        self.policy.max_retries
                    );
                    stats.written += chunk.len() - unprocessed;
                    stats.given_up += unprocessed;
                }
            }
        }

        info!(
            "Persisted {} records in {} batches ({} given up)",
            stats.written, stats.batches, stats.given_up
        );
        stats
    }

    async fn write_chunk(&self, chunk: Vec<ProductRecord>) -> BatchOutcome {
        let total = chunk.len();
        let pending = Mutex::new(chunk);
        let pending = &pending;
        let this = self;

        let result = Retry::start(self.policy.delays(), move || this.send_pending(pending)).await;

        match result {
            Ok(()) => BatchOutcome::AllAccepted,
            Err(StillUnprocessed(n)) => BatchOutcome::GivenUp { unprocessed: n.min(total) },
        }
    }

    /// One BatchWriteItem round. A request that fails outright counts as
    /// nothing processed.
    async fn send_pending(&self, pending: &Mutex<Vec<ProductRecord>>) -> Result<(), StillUnprocessed> {
        let batch = pending.lock().await.clone();
        let left = match self.store.write_batch(batch.clone()).await {
            Ok(left) => left,
            Err(e) => {
                warn!("Batch write failed: {:#}", e);
                batch
            }
        };

        if left.is_empty() {
            return Ok(());
        }
        debug!("{} items unprocessed, retrying", left.len());
        let n = left.len();
        *pending.lock().await = left;
        Err(StillUnprocessed(n))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
