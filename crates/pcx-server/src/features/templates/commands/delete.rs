//! Delete-template command

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteTemplateCommand {
    pub owner_id: Uuid,
    pub template_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteTemplateError {
    #[error("Template not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<(), DeleteTemplateError>> for DeleteTemplateCommand {}

impl crate::cqrs::middleware::Command for DeleteTemplateCommand {}

#[tracing::instrument(skip(pool))]
pub async fn handle(pool: PgPool, command: DeleteTemplateCommand) -> Result<(), DeleteTemplateError> {
    let result = sqlx::query("DELETE FROM import_templates WHERE id = $1 AND owner_id = $2")
        .bind(command.template_id)
        .bind(command.owner_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DeleteTemplateError::NotFound);
    }
    Ok(())
}
