//! Export routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::commands::create::{handle as handle_create, CreateExportError};
use super::commands::CreateExportCommand;
use super::queries::status::{handle as handle_status, GetExportStatusError};
use super::queries::GetExportStatusQuery;
use super::store::StoreError;
use super::types::ExportFilters;
use crate::error::AppError;
use crate::features::FeatureState;
use crate::middleware::auth::CurrentUser;
use crate::middleware::rate_limit::{self, RateCategory};

/// Create export routes
pub fn export_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(create_export))
        .route("/status", get(export_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateExportBody {
    export_type: String,
    format: String,
    #[serde(default)]
    filters: ExportFilters,
    #[serde(default)]
    columns: Option<Vec<String>>,
}

/// Generate an export synchronously
///
/// POST /export `{exportType, format, filters, columns}`
async fn create_export(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Json(body): Json<CreateExportBody>,
) -> Result<Response, AppError> {
    rate_limit::enforce(
        state.rate_limiter.as_ref(),
        &state.limits,
        RateCategory::Export,
        user.id,
    )?;

    let command = CreateExportCommand {
        owner_id: user.id,
        export_type: body.export_type,
        format: body.format,
        filters: body.filters,
        columns: body.columns,
    };

    let response = handle_create(state.db.clone(), state.storage.clone(), command)
        .await
        .map_err(create_error_to_app)?;

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
    export_id: Uuid,
}

/// Read an export job, including its signed URL when completed
///
/// GET /export/status?exportId=
async fn export_status(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Query(params): Query<StatusParams>,
) -> Result<Response, AppError> {
    let query = GetExportStatusQuery {
        owner_id: user.id,
        export_id: params.export_id,
    };

    match handle_status(state.db.clone(), state.storage.clone(), query).await {
        Ok(response) => Ok((StatusCode::OK, Json(response)).into_response()),
        Err(GetExportStatusError::NotFound) => {
            Err(AppError::NotFound("Export job not found".to_string()))
        }
        Err(GetExportStatusError::Storage(e)) => Err(AppError::Storage(e)),
        Err(GetExportStatusError::Database(e)) => Err(AppError::Database(e)),
    }
}

fn create_error_to_app(error: CreateExportError) -> AppError {
    match error {
        CreateExportError::UnknownType(_)
        | CreateExportError::UnknownFormat(_)
        | CreateExportError::TooManyColumns(_) => AppError::Validation(error.to_string()),
        CreateExportError::Store(StoreError::Database(e)) => AppError::Database(e),
        CreateExportError::Store(other) => AppError::Internal(other.to_string()),
        CreateExportError::Write(e) => AppError::Internal(e.to_string()),
        CreateExportError::Storage(e) => AppError::Storage(e),
        CreateExportError::Database(e) => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router: Router<FeatureState> = export_routes();
    }

    #[test]
    fn test_create_body_accepts_minimal_request() {
        let body: CreateExportBody =
            serde_json::from_str(r#"{"exportType": "products", "format": "csv"}"#).unwrap();
        assert_eq!(body.export_type, "products");
        assert!(body.columns.is_none());
    }
}
