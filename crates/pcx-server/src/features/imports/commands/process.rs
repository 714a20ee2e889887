//! Process command: run parse → validate → batch-persist for one job
//!
//! The pipeline runs synchronously inside the request. Row-level problems
//! never abort the job; infrastructure failures mark it failed exactly
//! once, keeping whatever progress earlier chunks committed.

use std::time::Duration;

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::super::processor::{self, Baseline, BatchOptions, ProcessError};
use super::super::store::{self, StoreError};
use super::super::types::SAMPLE_ERROR_LIMIT;
use crate::config::{LimitsConfig, DOWNLOAD_TIMEOUT_SECS};
use crate::features::shared::status::JobStatus;
use crate::parser::{self, ParseError, ParseLimits, UploadFormat};
use crate::storage::Storage;
use crate::validator::{self, PRODUCT_SCHEMA};

/// Caller-tunable processing options.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessOptions {
    pub batch_size: Option<usize>,
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessUploadCommand {
    pub owner_id: Uuid,
    pub upload_id: Uuid,
    pub options: ProcessOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessUploadResponse {
    pub total_records: i64,
    pub processed_records: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub sample_errors: Vec<SampleError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleError {
    pub row_number: i64,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessUploadError {
    #[error("Upload not found")]
    NotFound,
    #[error("Upload already {0}; resubmit the file as a new upload")]
    AlreadyProcessed(String),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Download timed out after {0}s")]
    DownloadTimeout(u64),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for ProcessUploadError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => ProcessUploadError::NotFound,
            other => ProcessUploadError::Process(ProcessError::Store(other)),
        }
    }
}

impl Request<Result<ProcessUploadResponse, ProcessUploadError>> for ProcessUploadCommand {}

impl crate::cqrs::middleware::Command for ProcessUploadCommand {}

#[tracing::instrument(skip(pool, storage, limits, cancel), fields(upload_id = %command.upload_id))]
pub async fn handle(
    pool: PgPool,
    storage: Storage,
    limits: &LimitsConfig,
    cancel: CancellationToken,
    command: ProcessUploadCommand,
) -> Result<ProcessUploadResponse, ProcessUploadError> {
    let job = store::get_job(&pool, command.upload_id, command.owner_id).await?;

    if JobStatus::from(job.status.clone()) != JobStatus::Uploaded {
        return Err(ProcessUploadError::AlreadyProcessed(job.status));
    }

    let format = UploadFormat::from_extension(&job.file_ext)
        .ok_or_else(|| ProcessUploadError::UnsupportedFormat(job.file_ext.clone()))?;

    match run_pipeline(&pool, &storage, limits, &cancel, &command, &job.storage_key, format, job.version, job.id).await {
        Ok(response) => Ok(response),
        Err(error) => {
            fail_with_latest(&pool, job.id, command.owner_id, &error.to_string()).await;
            Err(error)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    pool: &PgPool,
    storage: &Storage,
    limits: &LimitsConfig,
    cancel: &CancellationToken,
    command: &ProcessUploadCommand,
    storage_key: &str,
    format: UploadFormat,
    job_version: i64,
    job_id: Uuid,
) -> Result<ProcessUploadResponse, ProcessUploadError> {
    let bytes = tokio::time::timeout(
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        storage.download(storage_key),
    )
    .await
    .map_err(|_| ProcessUploadError::DownloadTimeout(DOWNLOAD_TIMEOUT_SECS))??;

    let parse_limits = ParseLimits::from_config(limits)
        .with_max_rows(command.options.max_rows.unwrap_or(limits.default_max_rows));
    let parsed = parser::parse_upload(format, bytes, parse_limits).await?;

    let total = parsed.rows.len() as i64;
    let mut version = store::mark_processing(pool, job_id, job_version, total).await?;

    let outcome = validator::validate_rows(&PRODUCT_SCHEMA, &parsed.rows);

    // Validation failures are persisted before the first chunk so the job
    // is inspectable mid-run.
    if !outcome.errors.is_empty() {
        store::add_row_errors(pool, job_id, &outcome.errors).await?;
    }
    let baseline = Baseline {
        total,
        processed: outcome.errors.len() as i64,
        success: 0,
        error: outcome.errors.len() as i64,
    };
    version = store::record_progress(
        pool,
        job_id,
        version,
        baseline.processed,
        baseline.success,
        baseline.error,
        processor::progress_pct(baseline.processed, total),
    )
    .await?;

    let report = processor::run_chunks(
        pool,
        job_id,
        command.owner_id,
        version,
        &outcome.valid,
        baseline,
        BatchOptions::resolve(command.options.batch_size),
        cancel,
    )
    .await?;

    let sample = store::list_row_errors(pool, job_id, SAMPLE_ERROR_LIMIT as i64).await?;
    let summary = if sample.is_empty() {
        None
    } else {
        Some(
            sample
                .iter()
                .map(|e| format!("row {}: {}", e.row_number, e.message))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };

    store::complete_job(pool, job_id, report.version, summary.as_deref()).await?;

    tracing::info!(
        job_id = %job_id,
        total,
        success = report.success,
        error = report.error,
        "import completed"
    );

    Ok(ProcessUploadResponse {
        total_records: total,
        processed_records: report.processed,
        success_count: report.success,
        error_count: report.error,
        sample_errors: sample
            .into_iter()
            .map(|e| SampleError {
                row_number: e.row_number,
                message: e.message,
            })
            .collect(),
    })
}

/// Mark the job failed using its latest version. Committed progress from
/// completed chunks is retained; a lost race means another writer already
/// finalized the job.
async fn fail_with_latest(pool: &PgPool, job_id: Uuid, owner_id: Uuid, message: &str) {
    match store::get_job(pool, job_id, owner_id).await {
        Ok(job) => {
            if JobStatus::from(job.status.clone()).is_terminal() {
                return;
            }
            if let Err(error) = store::fail_job(pool, job_id, job.version, message).await {
                tracing::error!(job_id = %job_id, ?error, "failed to mark job as failed");
            }
        }
        Err(error) => {
            tracing::error!(job_id = %job_id, ?error, "failed to load job for failure marking");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_options_deserialize_camel_case() {
        let options: ProcessOptions =
            serde_json::from_str(r#"{"batchSize": 250, "maxRows": 5000}"#).unwrap();
        assert_eq!(options.batch_size, Some(250));
        assert_eq!(options.max_rows, Some(5000));
    }

    #[test]
    fn test_process_options_default_empty() {
        let options: ProcessOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.batch_size, None);
        assert_eq!(options.max_rows, None);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let response = ProcessUploadResponse {
            total_records: 3,
            processed_records: 3,
            success_count: 2,
            error_count: 1,
            sample_errors: vec![SampleError {
                row_number: 3,
                message: "price: must be a number (got 'abc')".to_string(),
            }],
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["totalRecords"], 3);
        assert_eq!(value["successCount"], 2);
        assert_eq!(value["sampleErrors"][0]["rowNumber"], 3);
    }
}
