//! Save-template command (create or update)
//!
//! Setting a template as default clears any prior default for the same
//! (owner, file type) inside the same transaction, so the single-default
//! invariant holds under any sequence of calls.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::types::{ImportTemplate, TEMPLATE_FILE_TYPES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveTemplateCommand {
    pub owner_id: Uuid,
    /// Present on update, absent on create.
    pub template_id: Option<Uuid>,
    pub file_type: String,
    pub name: String,
    pub column_map: serde_json::Value,
    pub is_default: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SaveTemplateError {
    #[error("Template name is required and cannot be empty")]
    NameRequired,
    #[error("Template name must not exceed 100 characters")]
    NameTooLong,
    #[error("Invalid file type: {0}. Must be one of: csv, xlsx, json")]
    InvalidFileType(String),
    #[error("Column map must be a JSON object of source column to field name")]
    InvalidColumnMap,
    #[error("Template not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ImportTemplate, SaveTemplateError>> for SaveTemplateCommand {}

impl crate::cqrs::middleware::Command for SaveTemplateCommand {}

impl SaveTemplateCommand {
    pub fn validate(&self) -> Result<(), SaveTemplateError> {
        if self.name.trim().is_empty() {
            return Err(SaveTemplateError::NameRequired);
        }
        if self.name.len() > 100 {
            return Err(SaveTemplateError::NameTooLong);
        }
        if !TEMPLATE_FILE_TYPES.contains(&self.file_type.as_str()) {
            return Err(SaveTemplateError::InvalidFileType(self.file_type.clone()));
        }
        if !self.column_map.is_object() {
            return Err(SaveTemplateError::InvalidColumnMap);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(owner_id = %command.owner_id))]
pub async fn handle(
    pool: PgPool,
    command: SaveTemplateCommand,
) -> Result<ImportTemplate, SaveTemplateError> {
    command.validate()?;

    let mut tx = pool.begin().await?;

    if command.is_default {
        // Clear prior defaults first; the insert/update below then sets
        // the only default for this (owner, file_type).
        sqlx::query(
            "UPDATE import_templates SET is_default = false \
             WHERE owner_id = $1 AND file_type = $2 AND is_default",
        )
        .bind(command.owner_id)
        .bind(&command.file_type)
        .execute(&mut *tx)
        .await?;
    }

    let template = match command.template_id {
        Some(template_id) => sqlx::query_as::<_, ImportTemplate>(
            r#"
            UPDATE import_templates
            SET name = $3, file_type = $4, column_map = $5, is_default = $6,
                updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, file_type, name, column_map, is_default,
                      created_at, updated_at
            "#,
        )
        .bind(template_id)
        .bind(command.owner_id)
        .bind(&command.name)
        .bind(&command.file_type)
        .bind(&command.column_map)
        .bind(command.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(SaveTemplateError::NotFound)?,
        None => sqlx::query_as::<_, ImportTemplate>(
            r#"
            INSERT INTO import_templates
                (id, owner_id, file_type, name, column_map, is_default)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner_id, file_type, name, column_map, is_default,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(command.owner_id)
        .bind(&command.file_type)
        .bind(&command.name)
        .bind(&command.column_map)
        .bind(command.is_default)
        .fetch_one(&mut *tx)
        .await?,
    };

    tx.commit().await?;

    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command() -> SaveTemplateCommand {
        SaveTemplateCommand {
            owner_id: Uuid::new_v4(),
            template_id: None,
            file_type: "csv".to_string(),
            name: "My mapping".to_string(),
            column_map: json!({"Product Name": "name", "Cost": "price"}),
            is_default: false,
        }
    }

    #[test]
    fn test_validate_success() {
        assert!(command().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_name() {
        let mut cmd = command();
        cmd.name = "  ".to_string();
        assert!(matches!(
            cmd.validate(),
            Err(SaveTemplateError::NameRequired)
        ));
    }

    #[test]
    fn test_validate_long_name() {
        let mut cmd = command();
        cmd.name = "a".repeat(101);
        assert!(matches!(
            cmd.validate(),
            Err(SaveTemplateError::NameTooLong)
        ));
    }

    #[test]
    fn test_validate_bad_file_type() {
        let mut cmd = command();
        cmd.file_type = "parquet".to_string();
        assert!(matches!(
            cmd.validate(),
            Err(SaveTemplateError::InvalidFileType(_))
        ));
    }

    #[test]
    fn test_validate_non_object_column_map() {
        let mut cmd = command();
        cmd.column_map = json!(["name", "price"]);
        assert!(matches!(
            cmd.validate(),
            Err(SaveTemplateError::InvalidColumnMap)
        ));
    }
}
