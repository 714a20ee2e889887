//! Export status query
//!
//! Returns the job row, re-signing the download URL while the stored
//! object is still within its expiry window. Failed jobs never expose a
//! URL.

use std::time::Duration;

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::store::{self, StoreError};
use super::super::types::ExportJob;
use crate::features::shared::status::JobStatus;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetExportStatusQuery {
    pub owner_id: Uuid,
    pub export_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStatusResponse {
    #[serde(flatten)]
    pub job: ExportJob,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetExportStatusError {
    #[error("Export job not found")]
    NotFound,
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for GetExportStatusError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => GetExportStatusError::NotFound,
            StoreError::VersionConflict => {
                GetExportStatusError::Database(sqlx::Error::RowNotFound)
            }
            StoreError::Database(e) => GetExportStatusError::Database(e),
        }
    }
}

impl Request<Result<ExportStatusResponse, GetExportStatusError>> for GetExportStatusQuery {}

impl crate::cqrs::middleware::Query for GetExportStatusQuery {}

pub async fn handle(
    pool: PgPool,
    storage: Storage,
    query: GetExportStatusQuery,
) -> Result<ExportStatusResponse, GetExportStatusError> {
    let job = store::get_job(&pool, query.export_id, query.owner_id).await?;

    let download_url = match (
        JobStatus::from(job.status.clone()),
        job.storage_key.as_deref(),
        job.url_expires_at,
    ) {
        (JobStatus::Completed, Some(key), Some(expires_at)) if expires_at > Utc::now() => {
            let remaining = (expires_at - Utc::now()).num_seconds().max(1) as u64;
            Some(
                storage
                    .generate_presigned_url(key, Duration::from_secs(remaining))
                    .await?,
            )
        }
        _ => None,
    };

    Ok(ExportStatusResponse { job, download_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_omits_url_when_absent() {
        let response = ExportStatusResponse {
            job: ExportJob {
                id: Uuid::nil(),
                owner_id: Uuid::nil(),
                export_type: "products".to_string(),
                format: "csv".to_string(),
                filters: serde_json::json!({}),
                status: "failed".to_string(),
                progress: 50,
                record_count: 0,
                file_name: None,
                storage_key: None,
                url_expires_at: None,
                error_summary: Some("storage unavailable".to_string()),
                version: 3,
                created_at: Utc::now(),
                finished_at: Some(Utc::now()),
            },
            download_url: None,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("download_url").is_none());
        assert_eq!(value["status"], "failed");
    }
}
