//! Create-export command: query, serialize, upload, sign
//!
//! Runs the whole export synchronously. The job row is advanced in two
//! phases (progress 50 after the data fetch, 100 after the upload); any
//! stage failure marks the job failed and no partial file is ever
//! exposed through a signed URL.

use std::time::Duration;

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::data;
use super::super::store::{self, StoreError};
use super::super::types::{ExportFilters, ExportFormat, ExportJob, ExportType};
use super::super::writer::{self, WriteError};
use crate::config::{MAX_COLUMNS, MAX_EXPORT_RECORDS, SIGNED_URL_TTL_SECS};
use crate::features::products::store::{self as products, PRODUCT_EXPORT_COLUMNS};
use crate::features::shared::status::JobStatus;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExportCommand {
    pub owner_id: Uuid,
    pub export_type: String,
    pub format: String,
    #[serde(default)]
    pub filters: ExportFilters,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExportResponse {
    pub id: Uuid,
    pub file_name: String,
    pub record_count: i64,
    pub download_url: String,
    pub expires_at: chrono::DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateExportError {
    #[error("Unknown export type: {0}")]
    UnknownType(String),
    #[error("Unknown export format: {0}")]
    UnknownFormat(String),
    #[error("Too many columns requested (limit {0})")]
    TooManyColumns(usize),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Write(#[from] WriteError),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CreateExportResponse, CreateExportError>> for CreateExportCommand {}

impl crate::cqrs::middleware::Command for CreateExportCommand {}

impl CreateExportCommand {
    pub fn validate(&self) -> Result<(ExportType, ExportFormat), CreateExportError> {
        let export_type = ExportType::parse(&self.export_type)
            .ok_or_else(|| CreateExportError::UnknownType(self.export_type.clone()))?;
        let format = ExportFormat::parse(&self.format)
            .ok_or_else(|| CreateExportError::UnknownFormat(self.format.clone()))?;

        if let Some(ref columns) = self.columns {
            if columns.len() > MAX_COLUMNS {
                return Err(CreateExportError::TooManyColumns(MAX_COLUMNS));
            }
        }

        Ok((export_type, format))
    }
}

#[tracing::instrument(skip(pool, storage, command), fields(owner_id = %command.owner_id))]
pub async fn handle(
    pool: PgPool,
    storage: Storage,
    command: CreateExportCommand,
) -> Result<CreateExportResponse, CreateExportError> {
    let (export_type, format) = command.validate()?;

    let filters_json = serde_json::to_value(&command.filters)
        .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));
    let job = store::create_job(
        &pool,
        command.owner_id,
        export_type.as_str(),
        format.as_str(),
        &filters_json,
    )
    .await?;

    match generate(&pool, &storage, &command, export_type, format, &job).await {
        Ok(response) => Ok(response),
        Err(error) => {
            fail_with_latest(&pool, job.id, command.owner_id, &error.to_string()).await;
            Err(error)
        }
    }
}

async fn generate(
    pool: &PgPool,
    storage: &Storage,
    command: &CreateExportCommand,
    export_type: ExportType,
    format: ExportFormat,
    job: &ExportJob,
) -> Result<CreateExportResponse, CreateExportError> {
    let mut version = store::mark_processing(pool, job.id, job.version).await?;

    // Fetch one past the cap so truncation is detectable.
    let fetch_limit = MAX_EXPORT_RECORDS + 1;
    let (defaults, mut rows) = match export_type {
        ExportType::Products => {
            let products =
                products::query_for_export(pool, command.owner_id, &command.filters, fetch_limit)
                    .await?;
            (
                PRODUCT_EXPORT_COLUMNS,
                products
                    .iter()
                    .map(products::ProductRow::to_export_map)
                    .collect::<Vec<_>>(),
            )
        }
        ExportType::Campaigns => (
            data::CAMPAIGN_EXPORT_COLUMNS,
            data::query_campaigns(pool, command.owner_id, &command.filters, fetch_limit).await?,
        ),
        ExportType::Analytics => (
            data::ANALYTICS_EXPORT_COLUMNS,
            data::query_analytics(pool, command.owner_id, &command.filters, fetch_limit).await?,
        ),
    };

    if rows.len() as i64 > MAX_EXPORT_RECORDS {
        tracing::warn!(
            job_id = %job.id,
            cap = MAX_EXPORT_RECORDS,
            "export result exceeded the record cap; truncating"
        );
        rows.truncate(MAX_EXPORT_RECORDS as usize);
    }
    let record_count = rows.len() as i64;

    version = store::record_fetched(pool, job.id, version, record_count).await?;

    let (effective, downgraded) = format.effective();
    if downgraded {
        tracing::warn!(
            job_id = %job.id,
            "xlsx export downgraded to csv content with text/csv media type"
        );
    }

    let columns = writer::resolve_columns(defaults, command.columns.as_deref());
    let body = match effective {
        ExportFormat::Json => writer::write_json(&columns, &rows)?,
        _ => writer::write_csv(&columns, &rows)?,
    };

    let file_name = format!(
        "{}-{}.{}",
        export_type.as_str(),
        job.id,
        format.file_extension()
    );
    let storage_key = storage.build_export_key(command.owner_id, &file_name);

    storage
        .upload(&storage_key, body, Some(format.content_type().to_string()))
        .await?;

    let ttl = Duration::from_secs(SIGNED_URL_TTL_SECS);
    let download_url = storage.generate_presigned_url(&storage_key, ttl).await?;
    let expires_at = Utc::now() + chrono::Duration::seconds(SIGNED_URL_TTL_SECS as i64);

    store::complete_job(pool, job.id, version, &file_name, &storage_key, expires_at).await?;

    tracing::info!(
        job_id = %job.id,
        record_count,
        file = %file_name,
        "export completed"
    );

    Ok(CreateExportResponse {
        id: job.id,
        file_name,
        record_count,
        download_url,
        expires_at,
    })
}

async fn fail_with_latest(pool: &PgPool, job_id: Uuid, owner_id: Uuid, message: &str) {
    match store::get_job(pool, job_id, owner_id).await {
        Ok(job) => {
            if JobStatus::from(job.status.clone()).is_terminal() {
                return;
            }
            if let Err(error) = store::fail_job(pool, job_id, job.version, message).await {
                tracing::error!(job_id = %job_id, ?error, "failed to mark export as failed");
            }
        }
        Err(error) => {
            tracing::error!(job_id = %job_id, ?error, "failed to load export job for failure marking");
        }
    }
}
