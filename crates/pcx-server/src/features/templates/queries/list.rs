//! List saved templates for an owner

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::types::ImportTemplate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTemplatesQuery {
    pub owner_id: Uuid,
    pub file_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListTemplatesError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Vec<ImportTemplate>, ListTemplatesError>> for ListTemplatesQuery {}

impl crate::cqrs::middleware::Query for ListTemplatesQuery {}

pub async fn handle(
    pool: PgPool,
    query: ListTemplatesQuery,
) -> Result<Vec<ImportTemplate>, ListTemplatesError> {
    let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
        "SELECT id, owner_id, file_type, name, column_map, is_default, created_at, updated_at \
         FROM import_templates WHERE owner_id = ",
    );
    builder.push_bind(query.owner_id);

    if let Some(ref file_type) = query.file_type {
        builder.push(" AND file_type = ").push_bind(file_type);
    }
    builder.push(" ORDER BY is_default DESC, updated_at DESC");

    let templates = builder
        .build_query_as::<ImportTemplate>()
        .fetch_all(&pool)
        .await?;

    Ok(templates)
}
