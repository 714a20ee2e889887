//! Export job persistence, CAS on the version column throughout

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::types::ExportJob;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Export job not found")]
    NotFound,
    #[error("Concurrent update detected for export job")]
    VersionConflict,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const JOB_COLUMNS: &str = "id, owner_id, export_type, format, filters, status, progress, \
     record_count, file_name, storage_key, url_expires_at, error_summary, version, \
     created_at, finished_at";

/// Create a new export job in `pending` state.
pub async fn create_job(
    pool: &PgPool,
    owner_id: Uuid,
    export_type: &str,
    format: &str,
    filters: &serde_json::Value,
) -> Result<ExportJob, StoreError> {
    let job = sqlx::query_as::<_, ExportJob>(&format!(
        r#"
        INSERT INTO export_jobs (id, owner_id, export_type, format, filters, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(export_type)
    .bind(format)
    .bind(filters)
    .fetch_one(pool)
    .await?;

    Ok(job)
}

/// Fetch a job scoped to its owner.
pub async fn get_job(
    pool: &PgPool,
    job_id: Uuid,
    owner_id: Uuid,
) -> Result<ExportJob, StoreError> {
    sqlx::query_as::<_, ExportJob>(&format!(
        "SELECT {JOB_COLUMNS} FROM export_jobs WHERE id = $1 AND owner_id = $2"
    ))
    .bind(job_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

/// Transition `pending` → `processing`.
pub async fn mark_processing(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE export_jobs
        SET status = 'processing', version = version + 1
        WHERE id = $1 AND version = $2 AND status = 'pending'
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Phase one: data fetched, record count known, progress 50.
pub async fn record_fetched(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    record_count: i64,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE export_jobs
        SET record_count = $3, progress = 50, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(record_count)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Phase two: file uploaded and signed, progress 100, terminal.
pub async fn complete_job(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    file_name: &str,
    storage_key: &str,
    url_expires_at: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE export_jobs
        SET status = 'completed', progress = 100, file_name = $3, storage_key = $4,
            url_expires_at = $5, finished_at = now(), version = version + 1
        WHERE id = $1 AND version = $2 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(expected_version)
    .bind(file_name)
    .bind(storage_key)
    .bind(url_expires_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict);
    }
    Ok(expected_version + 1)
}

/// Terminal failure; no partial file is ever exposed through a URL.
pub async fn fail_job(
    pool: &PgPool,
    job_id: Uuid,
    expected_version: i64,
    message: &str,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE export_jobs
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
        tracing::warn!(job_id = %job_id, "fail_job lost a version race");
        return Err(StoreError::VersionConflict);
    }
    Ok(())
}
