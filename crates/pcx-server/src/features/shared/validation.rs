//! Shared validation utilities
//!
//! Common validation functions used across commands and queries.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Errors that can occur during filename validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilenameValidationError {
    #[error("Filename is required and cannot be empty")]
    Required,

    #[error("Filename must not exceed {max_length} characters")]
    TooLong { max_length: usize },

    #[error("Filename must not contain path separators")]
    PathSeparator,
}

/// Validate an uploaded filename
///
/// # Rules
/// - Must not be empty (after trimming whitespace)
/// - Must not exceed max_length characters
/// - Must not contain `/`, `\`, or `..` segments (storage keys embed it)
pub fn validate_filename(name: &str, max_length: usize) -> Result<(), FilenameValidationError> {
    if name.trim().is_empty() {
        return Err(FilenameValidationError::Required);
    }

    if name.len() > max_length {
        return Err(FilenameValidationError::TooLong { max_length });
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(FilenameValidationError::PathSeparator);
    }

    Ok(())
}

/// Check a requested export column name against the strict identifier
/// pattern `^[a-zA-Z_][a-zA-Z0-9_]*$`.
///
/// Anything else (spaces, quoting, SQL punctuation) fails and the
/// column is dropped from the projection rather than errored.
pub fn is_safe_identifier(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("identifier pattern must compile")
        })
        .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename_valid() {
        assert!(validate_filename("catalog.csv", 255).is_ok());
        assert!(validate_filename("products 2025.xlsx", 255).is_ok());
    }

    #[test]
    fn test_validate_filename_empty() {
        assert_eq!(
            validate_filename("", 255),
            Err(FilenameValidationError::Required)
        );
        assert_eq!(
            validate_filename("   ", 255),
            Err(FilenameValidationError::Required)
        );
    }

    #[test]
    fn test_validate_filename_too_long() {
        let long = "a".repeat(256);
        assert_eq!(
            validate_filename(&long, 255),
            Err(FilenameValidationError::TooLong { max_length: 255 })
        );
    }

    #[test]
    fn test_validate_filename_rejects_traversal() {
        assert_eq!(
            validate_filename("../etc/passwd", 255),
            Err(FilenameValidationError::PathSeparator)
        );
        assert_eq!(
            validate_filename("a/b.csv", 255),
            Err(FilenameValidationError::PathSeparator)
        );
        assert_eq!(
            validate_filename("a\\b.csv", 255),
            Err(FilenameValidationError::PathSeparator)
        );
    }

    #[test]
    fn test_is_safe_identifier() {
        assert!(is_safe_identifier("price"));
        assert!(is_safe_identifier("_private"));
        assert!(is_safe_identifier("col_2"));

        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("2fast"));
        assert!(!is_safe_identifier("price; DROP TABLE"));
        assert!(!is_safe_identifier("name with space"));
        assert!(!is_safe_identifier("naïve"));
    }
}
