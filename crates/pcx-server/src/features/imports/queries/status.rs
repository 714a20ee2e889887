//! Import status query
//!
//! Read-mostly endpoint polled by clients. Always reflects the latest
//! persisted state, including partial success after a fatal failure.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::store::{self, StoreError};
use super::super::types::{ImportJob, ImportRowError, SAMPLE_ERROR_LIMIT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetImportStatusQuery {
    pub owner_id: Uuid,
    pub upload_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStatusResponse {
    #[serde(flatten)]
    pub job: ImportJob,
    /// Up to ten row errors ordered by row number; the full list stays in
    /// import_row_errors.
    pub errors: Vec<ImportRowError>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetImportStatusError {
    #[error("Import job not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for GetImportStatusError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => GetImportStatusError::NotFound,
            StoreError::VersionConflict => {
                GetImportStatusError::Database(sqlx::Error::RowNotFound)
            }
            StoreError::Database(e) => GetImportStatusError::Database(e),
        }
    }
}

impl Request<Result<ImportStatusResponse, GetImportStatusError>> for GetImportStatusQuery {}

impl crate::cqrs::middleware::Query for GetImportStatusQuery {}

pub async fn handle(
    pool: PgPool,
    query: GetImportStatusQuery,
) -> Result<ImportStatusResponse, GetImportStatusError> {
    let job = store::get_job(&pool, query.upload_id, query.owner_id).await?;
    let errors = store::list_row_errors(&pool, job.id, SAMPLE_ERROR_LIMIT as i64).await?;

    Ok(ImportStatusResponse { job, errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_status_response_flattens_job() {
        let response = ImportStatusResponse {
            job: ImportJob {
                id: Uuid::nil(),
                owner_id: Uuid::nil(),
                original_filename: "catalog.csv".to_string(),
                storage_key: "imports/a/b/catalog.csv".to_string(),
                file_ext: "csv".to_string(),
                mime_type: "text/csv".to_string(),
                status: "processing".to_string(),
                progress: 40,
                total_records: 10,
                processed_records: 4,
                success_count: 3,
                error_count: 1,
                error_summary: None,
                version: 3,
                created_at: Utc::now(),
                started_at: Some(Utc::now()),
                finished_at: None,
            },
            errors: vec![],
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "processing");
        assert_eq!(value["progress"], 40);
        assert!(value["errors"].as_array().unwrap().is_empty());
    }
}
