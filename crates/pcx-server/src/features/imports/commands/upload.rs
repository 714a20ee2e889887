//! Upload command: accept a catalog file and create the import job
//!
//! Everything here is a tier-1 rejection gate: oversized, mistyped, or
//! magic-number-mismatched files fail before any job row or stored object
//! exists.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::super::store::{self, StoreError};
use crate::config::LimitsConfig;
use crate::features::shared::validation::{validate_filename, FilenameValidationError};
use crate::parser::{check_signature, ParseError, UploadFormat};
use crate::storage::Storage;

/// Catalog kinds accepted for import.
const VALID_UPLOAD_TYPES: &[&str] = &["products"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileCommand {
    pub owner_id: Uuid,
    pub filename: String,
    pub upload_type: String,
    pub declared_mime: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileResponse {
    pub id: Uuid,
    pub file_name: String,
    pub format: String,
    pub size_bytes: i64,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFileError {
    #[error("{0}")]
    Filename(#[from] FilenameValidationError),
    #[error("Unsupported upload type: {0}")]
    UnsupportedType(String),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("Content type '{declared}' does not match a {format} upload")]
    MimeMismatch { declared: String, format: String },
    #[error("File is empty")]
    Empty,
    #[error("File exceeds the {limit_bytes} byte upload limit")]
    TooLarge { limit_bytes: usize },
    #[error("File content does not match the declared format: {0}")]
    Signature(ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl Request<Result<UploadFileResponse, UploadFileError>> for UploadFileCommand {}

impl crate::cqrs::middleware::Command for UploadFileCommand {}

impl UploadFileCommand {
    /// Resolve the upload format from the filename extension.
    pub fn format(&self) -> Result<UploadFormat, UploadFileError> {
        let ext = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default();
        UploadFormat::from_extension(ext)
            .ok_or_else(|| UploadFileError::UnsupportedFormat(ext.to_string()))
    }

    pub fn validate(&self, limits: &LimitsConfig) -> Result<UploadFormat, UploadFileError> {
        validate_filename(&self.filename, 255)?;

        if !VALID_UPLOAD_TYPES.contains(&self.upload_type.as_str()) {
            return Err(UploadFileError::UnsupportedType(self.upload_type.clone()));
        }

        let format = self.format()?;

        if let Some(ref declared) = self.declared_mime {
            let declared_base = declared.split(';').next().unwrap_or(declared).trim();
            if !format.accepted_mime_types().contains(&declared_base) {
                return Err(UploadFileError::MimeMismatch {
                    declared: declared.clone(),
                    format: format.as_str().to_string(),
                });
            }
        }

        if self.content.is_empty() {
            return Err(UploadFileError::Empty);
        }
        if self.content.len() > limits.max_upload_bytes {
            return Err(UploadFileError::TooLarge {
                limit_bytes: limits.max_upload_bytes,
            });
        }

        check_signature(format, &self.content).map_err(UploadFileError::Signature)?;

        Ok(format)
    }
}

#[tracing::instrument(skip(pool, storage, command), fields(owner_id = %command.owner_id))]
pub async fn handle(
    pool: PgPool,
    storage: Storage,
    limits: &LimitsConfig,
    command: UploadFileCommand,
) -> Result<UploadFileResponse, UploadFileError> {
    let format = command.validate(limits)?;

    let job_id = Uuid::new_v4();
    let storage_key = storage.build_import_key(command.owner_id, job_id, &command.filename);
    let mime = command
        .declared_mime
        .clone()
        .unwrap_or_else(|| format.accepted_mime_types()[0].to_string());

    let size_bytes = command.content.len() as i64;
    storage
        .upload(&storage_key, command.content, Some(mime.clone()))
        .await?;

    let job = store::create_job(
        &pool,
        job_id,
        command.owner_id,
        &command.filename,
        &storage_key,
        format.as_str(),
        &mime,
    )
    .await?;

    tracing::info!(job_id = %job.id, file = %job.original_filename, size_bytes, "upload accepted");

    Ok(UploadFileResponse {
        id: job.id,
        file_name: job.original_filename,
        format: format.as_str().to_string(),
        size_bytes,
        status: job.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(filename: &str, content: &[u8]) -> UploadFileCommand {
        UploadFileCommand {
            owner_id: Uuid::new_v4(),
            filename: filename.to_string(),
            upload_type: "products".to_string(),
            declared_mime: None,
            content: content.to_vec(),
        }
    }

    fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    #[test]
    fn test_validate_accepts_csv() {
        let cmd = command("catalog.csv", b"name,price\n");
        assert_eq!(cmd.validate(&limits()).unwrap(), UploadFormat::Csv);
    }

    #[test]
    fn test_validate_rejects_unknown_extension() {
        let cmd = command("catalog.exe", b"MZ");
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_upload_type() {
        let mut cmd = command("catalog.csv", b"name\n");
        cmd.upload_type = "invoices".to_string();
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let cmd = command("catalog.csv", b"");
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::Empty)
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_file() {
        let mut small = limits();
        small.max_upload_bytes = 8;
        let cmd = command("catalog.csv", b"name,price,stock\n");
        assert!(matches!(
            cmd.validate(&small),
            Err(UploadFileError::TooLarge { limit_bytes: 8 })
        ));
    }

    #[test]
    fn test_validate_rejects_xlsx_without_zip_signature() {
        let cmd = command("catalog.xlsx", b"name,price\nWidget,1\n");
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::Signature(ParseError::SignatureMismatch(
                "xlsx"
            )))
        ));
    }

    #[test]
    fn test_validate_rejects_mime_mismatch() {
        let mut cmd = command("catalog.csv", b"name\n");
        cmd.declared_mime = Some("application/pdf".to_string());
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::MimeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_mime_with_parameters() {
        let mut cmd = command("catalog.csv", b"name\n");
        cmd.declared_mime = Some("text/csv; charset=utf-8".to_string());
        assert!(cmd.validate(&limits()).is_ok());
    }

    #[test]
    fn test_validate_rejects_path_traversal_filename() {
        let cmd = command("../../etc/passwd.csv", b"name\n");
        assert!(matches!(
            cmd.validate(&limits()),
            Err(UploadFileError::Filename(_))
        ));
    }
}
