//! Import routes
//!
//! `POST /upload` and `POST /process` are rate limited per identity;
//! every route requires an authenticated caller.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::commands::{
    process::{handle as handle_process, ProcessUploadError},
    upload::{handle as handle_upload, UploadFileError},
    ProcessOptions, ProcessUploadCommand, UploadFileCommand,
};
use super::queries::status::{handle as handle_status, GetImportStatusError};
use super::queries::GetImportStatusQuery;
use super::store::StoreError;
use crate::config::MAX_UPLOAD_BYTES;
use crate::error::AppError;
use crate::features::FeatureState;
use crate::middleware::auth::CurrentUser;
use crate::middleware::rate_limit::{self, RateCategory};

/// Create import routes
pub fn import_routes() -> Router<FeatureState> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/process", post(process_upload))
        .route("/status", get(import_status))
        // multipart framing overhead on top of the file budget
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
}

/// Accept a catalog file upload
///
/// POST /import/upload (multipart: `file`, `uploadType`)
async fn upload_file(
    State(state): State<FeatureState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    rate_limit::enforce(
        state.rate_limiter.as_ref(),
        &state.limits,
        RateCategory::Upload,
        user.id,
    )?;

    let mut filename = None;
    let mut declared_mime = None;
    let mut content = None;
    let mut upload_type = "products".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Rejected(format!("Malformed multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);
                declared_mime = field.content_type().map(str::to_string);
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Rejected(format!("Unreadable file field: {e}")))?,
                );
            }
            Some("uploadType") => {
                upload_type = field
                    .text()
                    .await
                    .map_err(|e| AppError::Rejected(format!("Unreadable uploadType: {e}")))?;
            }
            _ => {}
        }
    }

    let content = content.ok_or_else(|| AppError::Rejected("Missing file field".to_string()))?;
    let filename = filename.ok_or_else(|| AppError::Rejected("Missing filename".to_string()))?;

    let command = UploadFileCommand {
        owner_id: user.id,
        filename,
        upload_type,
        declared_mime,
        content: content.to_vec(),
    };

    let response = handle_upload(state.db.clone(), state.storage.clone(), &state.limits, command)
        .await
        .map_err(upload_error_to_app)?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequestBody {
    upload_id: Uuid,
    #[serde(default)]
    options: ProcessOptions,
}

/// Run the pipeline for an uploaded file
///
/// POST /import/process `{uploadId, options{batchSize?, maxRows?}}`
async fn process_upload(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Json(body): Json<ProcessRequestBody>,
) -> Result<Response, AppError> {
    rate_limit::enforce(
        state.rate_limiter.as_ref(),
        &state.limits,
        RateCategory::General,
        user.id,
    )?;

    let command = ProcessUploadCommand {
        owner_id: user.id,
        upload_id: body.upload_id,
        options: body.options,
    };

    let response = handle_process(
        state.db.clone(),
        state.storage.clone(),
        &state.limits,
        state.shutdown.child_token(),
        command,
    )
    .await
    .map_err(process_error_to_app)?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
    upload_id: Uuid,
}

/// Read a job with up to ten row errors
///
/// GET /import/status?uploadId=
async fn import_status(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Query(params): Query<StatusParams>,
) -> Result<Response, AppError> {
    let query = GetImportStatusQuery {
        owner_id: user.id,
        upload_id: params.upload_id,
    };

    match handle_status(state.db.clone(), query).await {
        Ok(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        Err(GetImportStatusError::NotFound) => {
            Err(AppError::NotFound("Import job not found".to_string()))
        }
        Err(GetImportStatusError::Database(e)) => Err(AppError::Database(e)),
    }
}

fn upload_error_to_app(error: UploadFileError) -> AppError {
    match error {
        UploadFileError::Store(StoreError::Database(e)) => AppError::Database(e),
        UploadFileError::Store(other) => AppError::Internal(other.to_string()),
        UploadFileError::Storage(e) => AppError::Storage(e),
        rejection => AppError::Rejected(rejection.to_string()),
    }
}

fn process_error_to_app(error: ProcessUploadError) -> AppError {
    match error {
        ProcessUploadError::NotFound => AppError::NotFound("Import job not found".to_string()),
        ProcessUploadError::AlreadyProcessed(_) => AppError::Conflict(error.to_string()),
        ProcessUploadError::UnsupportedFormat(_) | ProcessUploadError::Parse(_) => {
            AppError::Rejected(error.to_string())
        }
        ProcessUploadError::DownloadTimeout(_) | ProcessUploadError::Process(_) => {
            AppError::Internal(error.to_string())
        }
        ProcessUploadError::Storage(e) => AppError::Storage(e),
        ProcessUploadError::Database(e) => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router: Router<FeatureState> = import_routes();
    }

    #[test]
    fn test_process_body_accepts_missing_options() {
        let body: ProcessRequestBody = serde_json::from_str(
            r#"{"uploadId": "00000000-0000-0000-0000-000000000000"}"#,
        )
        .unwrap();
        assert!(body.options.batch_size.is_none());
    }
}
