//! Batched upsert writer.
//!
//! Splits rows into fixed-size groups and hands each group to the store as one
//! transaction. This is the only place retry policy lives.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use ocel_core::{OcelError, OcelResult, RetryConfig};

use crate::store::{is_transient, GraphStore, UpsertKind, UpsertRow};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome of writing one stage's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub rows: usize,
    pub batches: usize,
    pub retries: u32,
}

/// Writes rows in batches of `batch_size`.
#[derive(Debug, Clone)]
pub struct BatchWriter {
    batch_size: usize,
    retry: RetryConfig,
}

impl BatchWriter {
    /// `batch_size` must be positive; a zero is clamped to one.
    pub fn new(batch_size: usize, retry: RetryConfig) -> Self {
        Self {
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Apply `rows` of `kind` for `stage`.
    ///
    /// Empty input opens no transaction. The first batch that still fails
    /// after the retry budget aborts the write with its index.
    pub async fn write(
        &self,
        store: &dyn GraphStore,
        stage: &str,
        kind: UpsertKind,
        rows: &[UpsertRow],
    ) -> OcelResult<BatchStats> {
        let mut stats = BatchStats {
            rows: rows.len(),
            ..Default::default()
        };

        for (batch_index, chunk) in rows.chunks(self.batch_size).enumerate() {
            stats.retries += self.write_chunk(store, stage, kind, batch_index, chunk).await?;
            stats.batches += 1;
            debug!(stage, batch = batch_index, rows = chunk.len(), "Batch committed");
        }

        Ok(stats)
    }

    /// Write one chunk, returning how many retries it took.
    ///
    /// Only transient store errors are retried, with exponential backoff
    /// starting at `retry.backoff_ms`, until `retry.attempts` is used up.
    async fn write_chunk(
        &self,
        store: &dyn GraphStore,
        stage: &str,
        kind: UpsertKind,
        batch_index: usize,
        chunk: &[UpsertRow],
    ) -> OcelResult<u32> {
        let attempts = AtomicU32::new(0);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.retry.backoff_ms))
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(MAX_BACKOFF)
            .with_max_elapsed_time(None)
            .build();

        let counter = &attempts;
        let budget = self.retry.attempts;
        let result = backoff::future::retry_notify(
            policy,
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                store.write_batch(kind, chunk).await.map_err(|e| {
                    if attempt < budget && is_transient(&e) {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            },
            |e: anyhow::Error, wait: Duration| {
                warn!(
                    stage,
                    batch = batch_index,
                    attempt = counter.load(Ordering::SeqCst),
                    backoff_ms = wait.as_millis() as u64,
                    error = %format!("{:#}", e),
                    "Transient batch failure, retrying"
                );
            },
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        result.map(|()| attempts.saturating_sub(1)).map_err(|e| OcelError::BatchWrite {
            stage: stage.to_string(),
            batch_index,
            attempts,
            message: format!("{:#}", e),
        })
    }
}
