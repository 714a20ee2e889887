//! Import job models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Import job row (maps to the import_jobs table)
///
/// Invariants maintained by the pipeline:
/// `processed_records = success_count + error_count`,
/// `processed_records <= total_records`, and progress reflects
/// `processed / total` and never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub original_filename: String,
    pub storage_key: String,
    pub file_ext: String,
    pub mime_type: String,
    pub status: String,
    pub progress: i32,
    pub total_records: i64,
    pub processed_records: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub error_summary: Option<String>,
    /// Optimistic-lock column; every state write is a compare-and-swap.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One row-level failure attached to an import job. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportRowError {
    pub id: Uuid,
    pub job_id: Uuid,
    /// 1-based file row number; the header counts as row 1.
    pub row_number: i64,
    pub message: String,
    /// The normalized row exactly as parsed, for user correction.
    pub raw_row: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Number of row errors embedded inline in job summaries and status
/// responses; the full list stays queryable from import_row_errors.
pub const SAMPLE_ERROR_LIMIT: usize = 10;
