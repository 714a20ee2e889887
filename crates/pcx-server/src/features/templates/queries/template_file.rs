//! Downloadable sample template generation
//!
//! Generates a small sample file per accepted format so users can see
//! the expected columns before uploading. The `xlsx` template follows
//! the same policy as exports: CSV content served as `text/csv`, since
//! the spreadsheet writer stays off untrusted-adjacent paths.

use mediator::Request;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::features::exports::types::ExportFormat;

/// Sample rows shown in every generated template.
const SAMPLE_ROWS: &[[&str; 8]] = &[
    [
        "Ember Mug",
        "SKU-1001",
        "Temperature controlled mug",
        "99.95",
        "home",
        "25",
        "12.5",
        "active",
    ],
    [
        "Trail Pack 30L",
        "SKU-1002",
        "Lightweight hiking backpack",
        "149.00",
        "sports",
        "10",
        "10",
        "draft",
    ],
];

/// Column headers, matching the product schema's canonical fields.
const TEMPLATE_HEADERS: [&str; 8] = [
    "name",
    "sku",
    "description",
    "price",
    "category",
    "stock",
    "commission_rate",
    "status",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFileQuery {
    pub format: String,
    pub template_type: String,
}

#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateFileError {
    #[error("Unknown template format: {0}")]
    UnknownFormat(String),
    #[error("Unknown template type: {0}")]
    UnknownType(String),
    #[error("Template serialization failed: {0}")]
    Serialization(String),
}

impl Request<Result<TemplateFile, TemplateFileError>> for TemplateFileQuery {}

impl crate::cqrs::middleware::Query for TemplateFileQuery {}

pub fn handle(query: TemplateFileQuery) -> Result<TemplateFile, TemplateFileError> {
    if query.template_type != "products" {
        return Err(TemplateFileError::UnknownType(query.template_type));
    }

    let format = ExportFormat::parse(&query.format)
        .ok_or_else(|| TemplateFileError::UnknownFormat(query.format.clone()))?;

    let (effective, downgraded) = format.effective();
    if downgraded {
        tracing::warn!("xlsx template downgraded to csv content");
    }

    let body = match effective {
        ExportFormat::Json => render_json()?,
        _ => render_csv()?,
    };

    Ok(TemplateFile {
        file_name: format!("product-import-template.{}", format.file_extension()),
        content_type: format.content_type(),
        body,
    })
}

/// Field documentation served alongside the sample files.
pub fn field_documentation() -> serde_json::Value {
    json!({
        "name": "required; up to 200 characters",
        "sku": "optional; unique per catalog",
        "description": "optional; up to 2000 characters",
        "price": "required; 0 to 999999.99",
        "category": "electronics|fashion|home|beauty|sports|toys|grocery|other",
        "stock": "optional; non-negative integer",
        "commission_rate": "optional; 0 to 100",
        "status": "active|inactive|draft",
    })
}

fn render_csv() -> Result<Vec<u8>, TemplateFileError> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    writer
        .write_record(TEMPLATE_HEADERS)
        .map_err(|e| TemplateFileError::Serialization(e.to_string()))?;
    for row in SAMPLE_ROWS {
        writer
            .write_record(row)
            .map_err(|e| TemplateFileError::Serialization(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| TemplateFileError::Serialization(e.to_string()))
}

fn render_json() -> Result<Vec<u8>, TemplateFileError> {
    let records: Vec<serde_json::Value> = SAMPLE_ROWS
        .iter()
        .map(|row| {
            json!({
                "name": row[0],
                "sku": row[1],
                "description": row[2],
                "price": row[3],
                "category": row[4],
                "stock": row[5],
                "commission_rate": row[6],
                "status": row[7],
            })
        })
        .collect();

    // Uploads expect a bare array of flat objects, so the template is
    // exactly that and re-imports cleanly.
    serde_json::to_vec_pretty(&records)
        .map_err(|e| TemplateFileError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self, ParseLimits, UploadFormat};
    use crate::validator::{self, PRODUCT_SCHEMA};

    #[test]
    fn test_csv_template_has_header_and_samples() {
        let file = handle(TemplateFileQuery {
            format: "csv".to_string(),
            template_type: "products".to_string(),
        })
        .unwrap();

        let text = String::from_utf8(file.body).unwrap();
        assert!(text.starts_with("name,sku,description,price"));
        assert_eq!(text.lines().count(), 1 + SAMPLE_ROWS.len());
        assert_eq!(file.content_type, "text/csv");
    }

    #[test]
    fn test_xlsx_template_downgrades_to_csv() {
        let file = handle(TemplateFileQuery {
            format: "xlsx".to_string(),
            template_type: "products".to_string(),
        })
        .unwrap();

        assert_eq!(file.content_type, "text/csv");
        assert!(file.file_name.ends_with(".csv"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let result = handle(TemplateFileQuery {
            format: "pdf".to_string(),
            template_type: "products".to_string(),
        });
        assert!(matches!(result, Err(TemplateFileError::UnknownFormat(_))));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = handle(TemplateFileQuery {
            format: "csv".to_string(),
            template_type: "wallets".to_string(),
        });
        assert!(matches!(result, Err(TemplateFileError::UnknownType(_))));
    }

    #[test]
    fn test_csv_template_reimports_cleanly() {
        let file = handle(TemplateFileQuery {
            format: "csv".to_string(),
            template_type: "products".to_string(),
        })
        .unwrap();

        let parsed =
            parser::parse_bytes(UploadFormat::Csv, &file.body, &ParseLimits::default()).unwrap();
        let outcome = validator::validate_rows(&PRODUCT_SCHEMA, &parsed.rows);

        assert_eq!(outcome.valid.len(), SAMPLE_ROWS.len());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_json_template_reimports_cleanly() {
        let file = handle(TemplateFileQuery {
            format: "json".to_string(),
            template_type: "products".to_string(),
        })
        .unwrap();

        let parsed =
            parser::parse_bytes(UploadFormat::Json, &file.body, &ParseLimits::default()).unwrap();
        let outcome = validator::validate_rows(&PRODUCT_SCHEMA, &parsed.rows);

        assert_eq!(outcome.valid.len(), SAMPLE_ROWS.len());
        assert!(outcome.errors.is_empty());
    }
}
