//! Import template models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Saved column-mapping template (maps to the import_templates table)
///
/// Invariant: at most one row per (owner_id, file_type) has
/// `is_default = true`, enforced transactionally on save.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportTemplate {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub file_type: String,
    pub name: String,
    pub column_map: serde_json::Value,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// File types a template can target.
pub const TEMPLATE_FILE_TYPES: &[&str] = &["csv", "xlsx", "json"];
