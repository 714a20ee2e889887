//! Import job persistence
//!
//! All state writes are compare-and-swap on the job's version column, so
//! a second writer racing on the same job surfaces as a conflict instead
//! of silently interleaving counter updates.

use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use super::types::{ImportJob, ImportRowError};
use crate::validator::RowError;

/// Row errors are inserted in bounded batches to keep bind counts sane.
const ERROR_INSERT_BATCH: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Import job not found")]
    NotFound,
    #[error("Concurrent update detected for import job")]
    VersionConflict,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const JOB_COLUMNS: &str = "id, owner_id, original_filename, storage_key, file_ext, mime_type, \
     status, progress, total_records, processed_records, success_count, error_count, \
     error_summary, version, created_at, started_at, finished_at";

/// Create a new import job in `uploaded` state.
///
/// The id is chosen by the caller because the storage key embeds it and
/// the file is uploaded before the row exists.
pub async fn create_job(
    pool: &PgPool,
    job_id: Uuid,
    owner_id: Uuid,
    original_filename: &str,
    storage_key: &str,
    file_ext: &str,
    mime_type: &str,
) -> Result<ImportJob, StoreError> {
    let job = sqlx::query_as::<_, ImportJob>(&format!(
        r#"
        INSERT INTO import_jobs
            (id, owner_id, original_filename, storage_key, file_ext, mime_type, status)
        VALUES ($1, $2, $3, $4, $5, $6, 'uploaded')
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(job_id)
    .bind(owner_id)
    .bind(original_filename)
    .bind(storage_key)
    .bind(file_ext)
    .bind(mime_type)
    .fetch_one(pool)
    .await?;

    Ok(job)
}

/// Fetch a job scoped to its owner.
pub async fn get_job(
    pool: &PgPool,
    job_id: Uuid,
    owner_id: Uuid,
) -> Result<ImportJob, StoreError> {
    sqlx::query_as::<_, ImportJob>(&format!(
        "SELECT {JOB_COLUMNS} FROM import_jobs WHERE id = $1 AND owner_id = $2"
    ))
    .bind(job_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

/// Transition `uploaded` → `processing` and record the total row count.
///
/// Returns the new version on success.
pub async fn mark_processing(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    total_records: i64,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'processing', total_records = $3, started_at = now(),
            version = version + 1
        WHERE id = $1 AND version = $2 AND status = 'uploaded'
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(total_records)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Persist chunk progress. Called after every completed chunk so the job
/// row always reflects the last committed chunk, never a half-written one.
pub async fn record_progress(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    processed: i64,
    success: i64,
    error: i64,
    progress: i32,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET processed_records = $3, success_count = $4, error_count = $5,
            progress = $6, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(processed)
    .bind(success)
    .bind(error)
    .bind(progress)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Terminal transition to `completed` with the truncated error summary.
pub async fn complete_job(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    error_summary: Option<&str>,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'completed', progress = 100, error_summary = $3,
            finished_at = now(), version = version + 1
        WHERE id = $1 AND version = $2 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(error_summary)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Terminal transition to `failed`. Progress from completed chunks is
/// retained, not rolled back.
pub async fn fail_job(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    message: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET status = 'failed', error_summary = $3, finished_at = now(),
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        // Losing this race means another writer already finalized the job;
        // the terminal state stands.
        tracing::warn!(job_id = %job_id, "fail_job lost a version race");
        return Err(StoreError::VersionConflict);
    }
    Ok(())
}

/// Append row errors. Never updates existing rows.
pub async fn add_row_errors(
    pool: &PgPool,
    job_id: Uuid,
    errors: &[RowError],
) -> Result<(), StoreError> {
    for batch in errors.chunks(ERROR_INSERT_BATCH) {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("INSERT INTO import_row_errors (id, job_id, row_number, message, raw_row) ");

        builder.push_values(batch, |mut row, error| {
            row.push_bind(Uuid::new_v4())
                .push_bind(job_id)
                .push_bind(error.row_number)
                .push_bind(&error.message)
                .push_bind(serde_json::Value::Object(error.raw_row.clone()));
        });

        builder.build().execute(pool).await?;
    }

    Ok(())
}

/// Row errors for a job, ordered by file row number.
pub async fn list_row_errors(
    pool: &PgPool,
    job_id: Uuid,
    limit: i64,
) -> Result<Vec<ImportRowError>, StoreError> {
    let errors = sqlx::query_as::<_, ImportRowError>(
        r#"
        SELECT id, job_id, row_number, message, raw_row, created_at
        FROM import_row_errors
        WHERE job_id = $1
        ORDER BY row_number
        LIMIT $2
        "#,
    )
    .bind(job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(errors)
}
