//! Chunked batch persistence
//!
//! Consumes validated records in fixed-size chunks, one bulk insert per
//! chunk, persisting progress after every chunk. The loop is strictly
//! sequential: chunk N's progress write is observed before chunk N+1
//! begins, which keeps the running counters and progress monotonic
//! without any locking protocol.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::store::{self, StoreError};
use crate::config::{DEFAULT_CHUNK_SIZE, INSERT_TIMEOUT_SECS, MAX_CHUNK_SIZE};
use crate::features::products;
use crate::validator::{RowError, ValidRow};

/// Chunking options resolved from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub chunk_size: usize,
}

impl BatchOptions {
    /// Clamp a requested chunk size into [1, MAX_CHUNK_SIZE].
    pub fn resolve(requested: Option<usize>) -> Self {
        let chunk_size = requested
            .unwrap_or(DEFAULT_CHUNK_SIZE)
            .clamp(1, MAX_CHUNK_SIZE);
        Self { chunk_size }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::resolve(None)
    }
}

/// Counters carried into the chunk loop.
///
/// Validation errors are already persisted before the loop starts, so the
/// baseline reflects them: `processed = error = <validation failures>`.
#[derive(Debug, Clone, Copy)]
pub struct Baseline {
    pub total: i64,
    pub processed: i64,
    pub success: i64,
    pub error: i64,
}

/// Result of a completed chunk loop.
#[derive(Debug)]
pub struct BatchReport {
    pub processed: i64,
    pub success: i64,
    pub error: i64,
    /// Version of the job row after the final progress write.
    pub version: i64,
}

/// Chunk-loop failures. All of these are job-fatal; progress persisted by
/// completed chunks is retained.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Import cancelled")]
    Cancelled,
    #[error("Bulk insert timed out after {0}s")]
    InsertTimeout(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Run the chunk loop over validated rows.
///
/// Store-level failures on individual records are recorded as
/// database-category row errors and never abort the job; infrastructure
/// failures abort immediately.
pub async fn run_chunks(
    pool: &PgPool,
    job_id: Uuid,
    owner_id: Uuid,
    mut version: i64,
    rows: &[ValidRow],
    baseline: Baseline,
    options: BatchOptions,
    cancel: &CancellationToken,
) -> Result<BatchReport, ProcessError> {
    let mut processed = baseline.processed;
    let mut success = baseline.success;
    let mut error = baseline.error;

    for chunk in rows.chunks(options.chunk_size) {
        // Cancellation is only honored between chunks; a chunk that has
        // started always runs to its progress write.
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let outcome = tokio::time::timeout(
            Duration::from_secs(INSERT_TIMEOUT_SECS),
            products::store::insert_chunk(pool, owner_id, chunk),
        )
        .await
        .map_err(|_| ProcessError::InsertTimeout(INSERT_TIMEOUT_SECS))??;

        processed += chunk.len() as i64;
        success += outcome.inserted as i64;
        error += outcome.failures.len() as i64;

        if !outcome.failures.is_empty() {
            let row_errors: Vec<RowError> = outcome
                .failures
                .iter()
                .map(|(index, message)| {
                    let valid = &chunk[*index];
                    RowError {
                        row_number: valid.row_number,
                        message: format!("database: {message}"),
                        raw_row: valid.raw_row.clone(),
                    }
                })
                .collect();
            store::add_row_errors(pool, job_id, &row_errors).await?;
        }

        version = store::record_progress(
            pool,
            job_id,
            version,
            processed,
            success,
            error,
            progress_pct(processed, baseline.total),
        )
        .await?;

        tracing::debug!(
            job_id = %job_id,
            processed,
            success,
            error,
            "chunk committed"
        );
    }

    Ok(BatchReport {
        processed,
        success,
        error,
        version,
    })
}

/// Progress percentage for `processed` of `total`, clamped to [0, 100].
pub fn progress_pct(processed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 100;
    }
    ((processed * 100) / total).clamp(0, 100) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_options_defaults() {
        assert_eq!(BatchOptions::default().chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_batch_options_clamped_to_hard_cap() {
        assert_eq!(
            BatchOptions::resolve(Some(10_000)).chunk_size,
            MAX_CHUNK_SIZE
        );
        assert_eq!(BatchOptions::resolve(Some(0)).chunk_size, 1);
        assert_eq!(BatchOptions::resolve(Some(250)).chunk_size, 250);
    }

    #[test]
    fn test_progress_pct() {
        assert_eq!(progress_pct(0, 10), 0);
        assert_eq!(progress_pct(5, 10), 50);
        assert_eq!(progress_pct(10, 10), 100);
        assert_eq!(progress_pct(1, 3), 33);
        assert_eq!(progress_pct(0, 0), 100);
    }

    #[test]
    fn test_progress_is_monotonic_over_chunks() {
        let total = 1_000i64;
        let mut last = 0;
        for processed in (0..=total).step_by(100) {
            let pct = progress_pct(processed, total);
            assert!(pct >= last);
            last = pct;
        }
        assert_eq!(last, 100);
    }
}
