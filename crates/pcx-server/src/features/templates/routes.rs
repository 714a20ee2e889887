//! Template routes
//!
//! GET / serves a generated sample file; the remaining routes manage
//! saved column-mapping templates.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::commands::delete::{handle as handle_delete, DeleteTemplateError};
use super::commands::save::{handle as handle_save, SaveTemplateError};
use super::commands::{DeleteTemplateCommand, SaveTemplateCommand};
use super::queries::list::handle as handle_list;
use super::queries::template_file::{
    field_documentation, handle as handle_template_file, TemplateFileError,
};
use super::queries::{ListTemplatesQuery, TemplateFileQuery};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::middleware::auth::CurrentUser;
use crate::middleware::rate_limit::{self, RateCategory};

/// Create template routes
pub fn template_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(download_template).post(create_template))
        .route("/fields", get(template_fields))
        .route("/saved", get(list_templates))
        .route("/:template_id", put(update_template).delete(delete_template))
}

#[derive(Debug, Deserialize)]
struct TemplateFileParams {
    #[serde(default = "default_format")]
    format: String,
    #[serde(default = "default_type", rename = "type")]
    template_type: String,
}

fn default_format() -> String {
    "csv".to_string()
}

fn default_type() -> String {
    "products".to_string()
}

/// Download a generated sample template
///
/// GET /templates?format=&type=
async fn download_template(
    _user: CurrentUser,
    Query(params): Query<TemplateFileParams>,
) -> Result<Response, AppError> {
    let file = handle_template_file(TemplateFileQuery {
        format: params.format,
        template_type: params.template_type,
    })
    .map_err(template_file_error_to_app)?;

    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.body,
    )
        .into_response())
}

/// Field documentation for the product import schema
///
/// GET /templates/fields
async fn template_fields(_user: CurrentUser) -> Response {
    Json(field_documentation()).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveTemplateBody {
    file_type: String,
    name: String,
    column_map: serde_json::Value,
    #[serde(default)]
    is_default: bool,
}

/// Create a saved template
///
/// POST /templates
async fn create_template(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Json(body): Json<SaveTemplateBody>,
) -> Result<Response, AppError> {
    rate_limit::enforce(
        state.rate_limiter.as_ref(),
        &state.limits,
        RateCategory::General,
        user.id,
    )?;

    let command = SaveTemplateCommand {
        owner_id: user.id,
        template_id: None,
        file_type: body.file_type,
        name: body.name,
        column_map: body.column_map,
        is_default: body.is_default,
    };

    let template = handle_save(state.db.clone(), command)
        .await
        .map_err(save_error_to_app)?;

    Ok((StatusCode::CREATED, Json(template)).into_response())
}

/// Update a saved template
///
/// PUT /templates/:template_id
async fn update_template(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Path(template_id): Path<Uuid>,
    Json(body): Json<SaveTemplateBody>,
) -> Result<Response, AppError> {
    let command = SaveTemplateCommand {
        owner_id: user.id,
        template_id: Some(template_id),
        file_type: body.file_type,
        name: body.name,
        column_map: body.column_map,
        is_default: body.is_default,
    };

    let template = handle_save(state.db.clone(), command)
        .await
        .map_err(save_error_to_app)?;

    Ok((StatusCode::OK, Json(template)).into_response())
}

/// Delete a saved template
///
/// DELETE /templates/:template_id
async fn delete_template(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Path(template_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let command = DeleteTemplateCommand {
        owner_id: user.id,
        template_id,
    };

    match handle_delete(state.db.clone(), command).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(DeleteTemplateError::NotFound) => {
            Err(AppError::NotFound("Template not found".to_string()))
        }
        Err(DeleteTemplateError::Database(e)) => Err(AppError::Database(e)),
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(rename = "type")]
    file_type: Option<String>,
}

/// List saved templates
///
/// GET /templates/saved?type=
async fn list_templates(
    State(state): State<FeatureState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let query = ListTemplatesQuery {
        owner_id: user.id,
        file_type: params.file_type,
    };

    match handle_list(state.db.clone(), query).await {
        Ok(templates) => Ok(Json(templates).into_response()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

fn save_error_to_app(error: SaveTemplateError) -> AppError {
    match error {
        SaveTemplateError::NotFound => AppError::NotFound("Template not found".to_string()),
        SaveTemplateError::Database(e) => AppError::Database(e),
        validation => AppError::Validation(validation.to_string()),
    }
}

fn template_file_error_to_app(error: TemplateFileError) -> AppError {
    match error {
        TemplateFileError::Serialization(message) => AppError::Internal(message),
        validation => AppError::Validation(validation.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router: Router<FeatureState> = template_routes();
    }
}
