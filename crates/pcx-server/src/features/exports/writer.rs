//! Export serialization and column projection
//!
//! Requested columns are projected only when they match the strict
//! identifier pattern and exist on the record; everything else is
//! silently dropped. CSV string values are formula-defused on the way
//! out, so data that never passed through the import sanitizer (e.g.
//! campaign names) is still safe to open in spreadsheet software.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::features::shared::validation::is_safe_identifier;
use pcx_common::sanitize::defuse_formula;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

/// Resolve the effective column list for an export.
///
/// Requested names are kept in request order when they pass the
/// identifier pattern AND belong to the record's column set. If nothing
/// survives (or nothing was requested) the default set is used.
pub fn resolve_columns(defaults: &[&str], requested: Option<&[String]>) -> Vec<String> {
    let surviving: Vec<String> = requested
        .unwrap_or_default()
        .iter()
        .filter(|name| is_safe_identifier(name))
        .filter(|name| defaults.contains(&name.as_str()))
        .map(|name| name.to_string())
        .fold(Vec::new(), |mut acc, name| {
            if !acc.contains(&name) {
                acc.push(name);
            }
            acc
        });

    if surviving.is_empty() {
        defaults.iter().map(|name| name.to_string()).collect()
    } else {
        surviving
    }
}

/// Serialize rows as CSV with a header record.
pub fn write_csv(columns: &[String], rows: &[Map<String, Value>]) -> Result<Vec<u8>, WriteError> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());

    writer.write_record(columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| csv_cell(row.get(column)))
            .collect();
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| WriteError::Buffer(e.to_string()))
}

/// Serialize rows as a JSON array of objects projected to the columns.
pub fn write_json(columns: &[String], rows: &[Map<String, Value>]) -> Result<Vec<u8>, WriteError> {
    let projected: Vec<Map<String, Value>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    (
                        column.clone(),
                        row.get(column).cloned().unwrap_or(Value::Null),
                    )
                })
                .collect()
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&projected)?)
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => defuse_formula(s),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => String::new(),
        // flat rows only; anything nested was rejected upstream
        Some(other) => defuse_formula(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    const DEFAULTS: &[&str] = &["sku", "name", "price", "status"];

    #[test]
    fn test_resolve_columns_keeps_safe_known_names() {
        let requested = columns(&["price", "name"]);
        let resolved = resolve_columns(DEFAULTS, Some(&requested));
        assert_eq!(resolved, vec!["price", "name"]);
    }

    #[test]
    fn test_resolve_columns_drops_unsafe_names_silently() {
        let requested = columns(&["price; DROP TABLE", "name"]);
        let resolved = resolve_columns(DEFAULTS, Some(&requested));
        assert_eq!(resolved, vec!["name"]);
    }

    #[test]
    fn test_resolve_columns_drops_unknown_names() {
        let requested = columns(&["secret_margin", "sku"]);
        let resolved = resolve_columns(DEFAULTS, Some(&requested));
        assert_eq!(resolved, vec!["sku"]);
    }

    #[test]
    fn test_resolve_columns_falls_back_to_defaults() {
        assert_eq!(resolve_columns(DEFAULTS, None).len(), DEFAULTS.len());

        let all_bad = columns(&["1; --", "nope"]);
        assert_eq!(
            resolve_columns(DEFAULTS, Some(&all_bad)).len(),
            DEFAULTS.len()
        );
    }

    #[test]
    fn test_resolve_columns_dedupes() {
        let requested = columns(&["name", "name", "sku"]);
        let resolved = resolve_columns(DEFAULTS, Some(&requested));
        assert_eq!(resolved, vec!["name", "sku"]);
    }

    #[test]
    fn test_write_csv_round_trip() {
        let cols = columns(&["name", "price"]);
        let rows = vec![
            row(&[("name", Value::from("Widget")), ("price", Value::from(9.99))]),
            row(&[("name", Value::from("Gadget")), ("price", Value::Null)]),
        ];

        let bytes = write_csv(&cols, &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(text, "name,price\nWidget,9.99\nGadget,\n");
    }

    #[test]
    fn test_write_csv_defuses_formulas() {
        let cols = columns(&["name"]);
        let rows = vec![row(&[("name", Value::from("=HYPERLINK(evil)"))])];

        let bytes = write_csv(&cols, &rows).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("'=HYPERLINK(evil)"));
    }

    #[test]
    fn test_write_json_projects_columns() {
        let cols = columns(&["name"]);
        let rows = vec![row(&[
            ("name", Value::from("Widget")),
            ("secret", Value::from("hidden")),
        ])];

        let bytes = write_json(&cols, &rows).unwrap();
        let parsed: Vec<Map<String, Value>> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(parsed[0]["name"], Value::from("Widget"));
        assert!(!parsed[0].contains_key("secret"));
    }

    #[test]
    fn test_write_json_fills_missing_with_null() {
        let cols = columns(&["name", "price"]);
        let rows = vec![row(&[("name", Value::from("Widget"))])];

        let bytes = write_json(&cols, &rows).unwrap();
        let parsed: Vec<Map<String, Value>> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed[0]["price"], Value::Null);
    }
}
