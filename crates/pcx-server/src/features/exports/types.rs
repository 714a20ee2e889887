//! Export job models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::products::store::ProductFilters;

/// Export job row (maps to the export_jobs table)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExportJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub export_type: String,
    pub format: String,
    pub filters: serde_json::Value,
    pub status: String,
    pub progress: i32,
    pub record_count: i64,
    pub file_name: Option<String>,
    pub storage_key: Option<String>,
    pub url_expires_at: Option<DateTime<Utc>>,
    pub error_summary: Option<String>,
    /// Optimistic-lock column, CAS on every write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Kinds of data an owner can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Products,
    Campaigns,
    Analytics,
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Products => "products",
            ExportType::Campaigns => "campaigns",
            ExportType::Analytics => "analytics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "products" => Some(ExportType::Products),
            "campaigns" => Some(ExportType::Campaigns),
            "analytics" => Some(ExportType::Analytics),
            _ => None,
        }
    }
}

/// Requested output formats.
///
/// `xlsx` is accepted but deliberately downgraded: the generated content
/// is CSV served as `text/csv`, because a spreadsheet writer has no place
/// on an untrusted-adjacent generation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" => Some(ExportFormat::Xlsx),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    /// The format actually generated, and whether a downgrade happened.
    pub fn effective(&self) -> (ExportFormat, bool) {
        match self {
            ExportFormat::Xlsx => (ExportFormat::Csv, true),
            other => (*other, false),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.effective().0 {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            // unreachable after effective(), kept for totality
            ExportFormat::Xlsx => "text/csv",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        self.effective().0.as_str()
    }
}

/// Filter specification accepted on export requests. Products use all
/// fields; campaigns and analytics use the subset that applies.
pub type ExportFilters = ProductFilters;
