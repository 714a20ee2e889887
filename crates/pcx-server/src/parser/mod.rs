//! Secure catalog parsers
//!
//! Turns an untrusted byte buffer in one of the accepted formats (CSV,
//! XLSX, JSON) into a bounded list of normalized row mappings. Every
//! format shares the same hygiene pass: canonical header keys, cell
//! truncation, control/markup stripping, and spreadsheet-formula defusing.
//!
//! Parsing is all-or-nothing: a violated limit or malformed structure
//! fails the whole file and no partial row set is returned. Per-row
//! problems are the validator's job, not the parser's.

pub mod csv;
pub mod json;
pub mod xlsx;

use crate::config::LimitsConfig;
use pcx_common::sanitize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// A parsed record keyed by canonical column names.
pub type NormalizedRow = HashMap<String, String>;

/// Output of a successful parse: header order plus row mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUpload {
    /// Canonical column keys in file order.
    pub headers: Vec<String>,
    /// One mapping per data row, in file order.
    pub rows: Vec<NormalizedRow>,
}

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    Xlsx,
    Json,
}

impl UploadFormat {
    /// Resolve a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Some(UploadFormat::Csv),
            "xlsx" => Some(UploadFormat::Xlsx),
            "json" => Some(UploadFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadFormat::Csv => "csv",
            UploadFormat::Xlsx => "xlsx",
            UploadFormat::Json => "json",
        }
    }

    /// MIME types acceptable for this format on upload.
    pub fn accepted_mime_types(&self) -> &'static [&'static str] {
        match self {
            UploadFormat::Csv => &["text/csv", "application/csv", "text/plain"],
            UploadFormat::Xlsx => &[
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/octet-stream",
            ],
            UploadFormat::Json => &["application/json", "text/json"],
        }
    }
}

impl std::str::FromStr for UploadFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UploadFormat::from_extension(s).ok_or_else(|| ParseError::UnsupportedFormat(s.to_string()))
    }
}

/// Bounds applied to a single parse.
#[derive(Debug, Clone)]
pub struct ParseLimits {
    pub max_rows: usize,
    pub max_columns: usize,
    pub max_cell_chars: usize,
    pub max_text_bytes: usize,
    pub timeout_secs: u64,
}

impl ParseLimits {
    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self {
            max_rows: limits.default_max_rows,
            max_columns: limits.max_columns,
            max_cell_chars: limits.max_cell_chars,
            max_text_bytes: limits.max_text_bytes,
            timeout_secs: limits.parse_timeout_secs,
        }
    }

    /// Override the row ceiling for one call, never beyond the absolute
    /// limit.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.min(crate::config::ABSOLUTE_MAX_ROWS);
        self
    }
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default())
    }
}

/// Structural parse failures. Any of these rejects the whole file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("File is empty")]
    Empty,

    #[error("File exceeds the {limit_bytes} byte limit")]
    TooLarge { limit_bytes: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File does not match the declared {0} format")]
    SignatureMismatch(&'static str),

    #[error("Too many columns: {found} (limit {limit})")]
    TooManyColumns { found: usize, limit: usize },

    #[error("Missing or unusable header row")]
    NoHeader,

    #[error("Column name '{0}' is not allowed")]
    ForbiddenColumn(String),

    #[error("Top-level JSON value must be an array of objects")]
    NotAnArray,

    #[error("Record {0} is not a flat object")]
    NotFlat(usize),

    #[error("Malformed {0}")]
    Malformed(String),

    #[error("Parsing timed out after {0}s")]
    Timeout(u64),
}

/// Verify the buffer's leading bytes match the declared format.
///
/// XLSX requires the ZIP local-file-header signature; a declared XLSX
/// without it is rejected outright rather than degraded to a text parse.
pub fn check_signature(format: UploadFormat, bytes: &[u8]) -> Result<(), ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    match format {
        UploadFormat::Xlsx => {
            if !xlsx::has_zip_signature(bytes) {
                return Err(ParseError::SignatureMismatch("xlsx"));
            }
            Ok(())
        }
        // CSV and JSON carry no magic number; structure is checked in-parse.
        UploadFormat::Csv | UploadFormat::Json => Ok(()),
    }
}

/// Parse an upload under the given limits, bounded by a wall-clock budget.
///
/// The format parse runs on a blocking worker; the timeout aborts it with
/// a distinct [`ParseError::Timeout`] so callers can tell resource
/// exhaustion apart from malformed input.
pub async fn parse_upload(
    format: UploadFormat,
    bytes: Vec<u8>,
    limits: ParseLimits,
) -> Result<ParsedUpload, ParseError> {
    check_signature(format, &bytes)?;

    let timeout_secs = limits.timeout_secs;
    let work = tokio::task::spawn_blocking(move || parse_bytes(format, &bytes, &limits));

    match tokio::time::timeout(Duration::from_secs(timeout_secs), work).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ParseError::Malformed(format!(
            "parser task failed: {join_err}"
        ))),
        Err(_) => Err(ParseError::Timeout(timeout_secs)),
    }
}

/// Synchronous format dispatch. Exposed for tests and the template
/// round-trip check; production callers go through [`parse_upload`].
pub fn parse_bytes(
    format: UploadFormat,
    bytes: &[u8],
    limits: &ParseLimits,
) -> Result<ParsedUpload, ParseError> {
    match format {
        UploadFormat::Csv => self::csv::parse_csv(bytes, limits),
        UploadFormat::Xlsx => self::xlsx::parse_xlsx(bytes, limits),
        UploadFormat::Json => self::json::parse_json(bytes, limits),
    }
}

/// Normalize one raw header cell into a canonical key.
///
/// Rejects dangerous prototype names; returns None for headers that
/// normalize to nothing (their column is dropped).
pub(crate) fn normalize_header(raw: &str) -> Result<Option<String>, ParseError> {
    let key = sanitize::normalize_key(raw);
    if key.is_empty() {
        return Ok(None);
    }
    if sanitize::is_dangerous_key(&key) {
        return Err(ParseError::ForbiddenColumn(key));
    }
    Ok(Some(key))
}

/// Shared cell hygiene: truncate, strip, defuse.
pub(crate) fn scrub_cell(raw: &str, limits: &ParseLimits) -> String {
    let truncated = sanitize::truncate_chars(raw, limits.max_cell_chars);
    let cleaned = sanitize::clean_value(&truncated);
    sanitize::defuse_formula(&cleaned)
}
