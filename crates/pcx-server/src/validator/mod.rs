//! Schema-driven row validation
//!
//! Applies column-alias resolution and typed coercion to normalized rows,
//! partitioning every input row into exactly one of two outcomes: a
//! [`ValidatedRecord`] ready for bulk insert, or a [`RowError`] carrying
//! the 1-based file row number and the verbatim raw row for user
//! correction. No row is ever silently dropped.

pub mod detect;

use crate::parser::NormalizedRow;
use serde::Serialize;
use serde_json::{Map, Value};

/// Upper bound accepted for a product price.
pub const PRICE_MAX: f64 = 999_999.99;

/// Upper bound accepted for a commission rate, in percent.
pub const COMMISSION_MAX: f64 = 100.0;

/// Field value kinds with their coercion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, trimmed and truncated.
    Text { max_chars: usize },
    /// Non-negative money amount, clamped to [0, PRICE_MAX].
    Price,
    /// Non-negative integer count.
    Count,
    /// Percentage clamped to [0, COMMISSION_MAX].
    Percent,
    /// Closed vocabulary; unrecognized values fall back to the default.
    Choice {
        allowed: &'static [&'static str],
        default: &'static str,
    },
}

/// One field of a record schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

/// A record schema: descriptors plus the column-alias table.
#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub fields: &'static [FieldDescriptor],
    /// (incoming canonical key, schema field name)
    pub aliases: &'static [(&'static str, &'static str)],
}

/// Product catalog schema.
pub static PRODUCT_SCHEMA: RecordSchema = RecordSchema {
    fields: &[
        FieldDescriptor {
            name: "name",
            kind: FieldKind::Text { max_chars: 200 },
            required: true,
        },
        FieldDescriptor {
            name: "sku",
            kind: FieldKind::Text { max_chars: 64 },
            required: false,
        },
        FieldDescriptor {
            name: "description",
            kind: FieldKind::Text { max_chars: 2000 },
            required: false,
        },
        FieldDescriptor {
            name: "price",
            kind: FieldKind::Price,
            required: true,
        },
        FieldDescriptor {
            name: "category",
            kind: FieldKind::Choice {
                allowed: &[
                    "electronics",
                    "fashion",
                    "home",
                    "beauty",
                    "sports",
                    "toys",
                    "grocery",
                    "other",
                ],
                default: "other",
            },
            required: false,
        },
        FieldDescriptor {
            name: "stock",
            kind: FieldKind::Count,
            required: false,
        },
        FieldDescriptor {
            name: "commission_rate",
            kind: FieldKind::Percent,
            required: false,
        },
        FieldDescriptor {
            name: "status",
            kind: FieldKind::Choice {
                allowed: &["active", "inactive", "draft"],
                default: "draft",
            },
            required: false,
        },
    ],
    aliases: &[
        ("product_name", "name"),
        ("title", "name"),
        ("item_name", "name"),
        ("product_code", "sku"),
        ("item_number", "sku"),
        ("item_no", "sku"),
        ("desc", "description"),
        ("details", "description"),
        ("cost", "price"),
        ("unit_price", "price"),
        ("amount", "price"),
        ("category_name", "category"),
        ("product_category", "category"),
        ("qty", "stock"),
        ("quantity", "stock"),
        ("stock_quantity", "stock"),
        ("inventory", "stock"),
        ("commission", "commission_rate"),
        ("state", "status"),
    ],
};

/// A schema-conformant product ready for bulk insert. Never persisted in
/// this shape; the batch processor maps it onto the products table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedRecord {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub stock: i32,
    pub commission_rate: f64,
    pub status: String,
}

/// A per-row validation failure.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based file row number; the header counts as row 1, so data row N
    /// reports as N + 1.
    pub row_number: i64,
    /// Human-readable message including the field path.
    pub message: String,
    /// The normalized row exactly as the parser produced it.
    pub raw_row: Map<String, Value>,
}

/// A validated row, keeping its file position and raw payload so that a
/// later store-level insert failure can still be reported per-row.
#[derive(Debug, Clone)]
pub struct ValidRow {
    pub row_number: i64,
    pub record: ValidatedRecord,
    pub raw_row: Map<String, Value>,
}

/// Partition of an input batch.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<ValidRow>,
    pub errors: Vec<RowError>,
}

/// A single field's failure inside one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a batch of normalized rows against the product schema.
///
/// Every row lands in exactly one of the two output buckets.
pub fn validate_rows(schema: &RecordSchema, rows: &[NormalizedRow]) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index as i64 + 2; // +1 for 1-based, +1 for the header row
        match validate_row(schema, row) {
            Ok(record) => outcome.valid.push(ValidRow {
                row_number,
                record,
                raw_row: raw_row_payload(row),
            }),
            Err(field_errors) => {
                let message = field_errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                outcome.errors.push(RowError {
                    row_number,
                    message,
                    raw_row: raw_row_payload(row),
                });
            }
        }
    }

    outcome
}

/// Validate one row: alias resolution, then per-field coercion.
///
/// Pure function; the tagged result carries either the conformant record
/// or every field failure found in the row.
pub fn validate_row(
    schema: &RecordSchema,
    row: &NormalizedRow,
) -> Result<ValidatedRecord, Vec<FieldError>> {
    let mut errors: Vec<FieldError> = Vec::new();
    let mut fields: Map<String, Value> = Map::new();

    for descriptor in schema.fields {
        let raw = resolve_field(schema, row, descriptor.name);

        match coerce_field(descriptor, raw) {
            Ok(value) => {
                fields.insert(descriptor.name.to_string(), value);
            }
            Err(error) => errors.push(error),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(record_from_fields(&fields))
}

/// Look up a schema field in the row, trying the exact name first and
/// falling back to aliases.
fn resolve_field<'a>(
    schema: &RecordSchema,
    row: &'a NormalizedRow,
    field: &str,
) -> Option<&'a str> {
    if let Some(value) = row.get(field) {
        return Some(value.as_str());
    }

    schema
        .aliases
        .iter()
        .filter(|(_, target)| *target == field)
        .find_map(|(alias, _)| row.get(*alias))
        .map(String::as_str)
}

fn coerce_field(descriptor: &FieldDescriptor, raw: Option<&str>) -> Result<Value, FieldError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        if descriptor.required {
            return Err(FieldError::new(descriptor.name, "is required"));
        }
        return Ok(default_value(&descriptor.kind));
    }

    match descriptor.kind {
        FieldKind::Text { max_chars } => Ok(Value::String(
            pcx_common::sanitize::truncate_chars(trimmed, max_chars),
        )),
        FieldKind::Price => {
            let amount = parse_number(trimmed).ok_or_else(|| {
                FieldError::new(descriptor.name, format!("must be a number (got '{trimmed}')"))
            })?;
            Ok(json_f64(amount.clamp(0.0, PRICE_MAX)))
        }
        FieldKind::Count => {
            let count = strip_guard_quote(trimmed)
                .parse::<i64>()
                .ok()
                .or_else(|| parse_number(trimmed).map(|n| n as i64))
                .ok_or_else(|| {
                    FieldError::new(
                        descriptor.name,
                        format!("must be a whole number (got '{trimmed}')"),
                    )
                })?;
            Ok(Value::from(count.clamp(0, i32::MAX as i64)))
        }
        FieldKind::Percent => {
            let rate = parse_number(trimmed.trim_end_matches('%')).ok_or_else(|| {
                FieldError::new(
                    descriptor.name,
                    format!("must be a percentage (got '{trimmed}')"),
                )
            })?;
            Ok(json_f64(rate.clamp(0.0, COMMISSION_MAX)))
        }
        FieldKind::Choice { allowed, default } => {
            let candidate = trimmed.to_ascii_lowercase();
            if allowed.contains(&candidate.as_str()) {
                Ok(Value::String(candidate))
            } else {
                // unrecognized vocabulary falls back, it is not an error
                Ok(Value::String(default.to_string()))
            }
        }
    }
}

fn default_value(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Text { .. } => Value::Null,
        FieldKind::Price | FieldKind::Percent => json_f64(0.0),
        FieldKind::Count => Value::from(0),
        FieldKind::Choice { default, .. } => Value::String(default.to_string()),
    }
}

/// Parse a numeric cell. Cells arrive formula-defused, so a leading guard
/// quote is stripped before parsing; currency symbols and thousands
/// separators are tolerated.
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = strip_guard_quote(raw)
        .chars()
        .filter(|ch| !matches!(ch, '$' | '€' | '£' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn strip_guard_quote(raw: &str) -> &str {
    raw.strip_prefix('\'').unwrap_or(raw).trim()
}

fn json_f64(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn record_from_fields(fields: &Map<String, Value>) -> ValidatedRecord {
    let text = |key: &str| -> Option<String> {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    let number = |key: &str| -> f64 { fields.get(key).and_then(Value::as_f64).unwrap_or(0.0) };

    ValidatedRecord {
        name: text("name").unwrap_or_default(),
        sku: text("sku").filter(|s| !s.is_empty()),
        description: text("description").filter(|s| !s.is_empty()),
        price: number("price"),
        category: text("category").unwrap_or_else(|| "other".to_string()),
        stock: fields
            .get("stock")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32,
        commission_rate: number("commission_rate"),
        status: text("status").unwrap_or_else(|| "draft".to_string()),
    }
}

fn raw_row_payload(row: &NormalizedRow) -> Map<String, Value> {
    let mut payload = Map::new();
    let mut keys: Vec<&String> = row.keys().collect();
    keys.sort();
    for key in keys {
        payload.insert(key.clone(), Value::String(row[key].clone()));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, &str)]) -> NormalizedRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn test_valid_row() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[
                ("name", "Widget"),
                ("price", "9.99"),
                ("category", "electronics"),
                ("stock", "5"),
            ]),
        )
        .unwrap();

        assert_eq!(record.name, "Widget");
        assert_eq!(record.price, 9.99);
        assert_eq!(record.category, "electronics");
        assert_eq!(record.stock, 5);
        assert_eq!(record.status, "draft");
    }

    #[test]
    fn test_alias_resolution() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("product_name", "Widget"), ("cost", "4")]),
        )
        .unwrap();
        assert_eq!(record.name, "Widget");
        assert_eq!(record.price, 4.0);
    }

    #[test]
    fn test_exact_name_beats_alias() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "Exact"), ("product_name", "Alias"), ("price", "1")]),
        )
        .unwrap();
        assert_eq!(record.name, "Exact");
    }

    #[test]
    fn test_missing_required_field() {
        let errors = validate_row(&PRODUCT_SCHEMA, &row(&[("price", "1")])).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_unparseable_price() {
        let errors =
            validate_row(&PRODUCT_SCHEMA, &row(&[("name", "Widget"), ("price", "abc")]))
                .unwrap_err();
        assert_eq!(errors[0].field, "price");
        assert!(errors[0].message.contains("abc"));
    }

    #[test]
    fn test_price_clamped_to_bounds() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "W"), ("price", "9999999")]),
        )
        .unwrap();
        assert_eq!(record.price, PRICE_MAX);

        // formula-defused negative amount parses, then clamps to zero
        let record =
            validate_row(&PRODUCT_SCHEMA, &row(&[("name", "W"), ("price", "'-4")])).unwrap();
        assert_eq!(record.price, 0.0);
    }

    #[test]
    fn test_currency_symbols_tolerated() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "W"), ("price", "$1,299.50")]),
        )
        .unwrap();
        assert_eq!(record.price, 1299.50);
    }

    #[test]
    fn test_commission_clamped() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "W"), ("price", "1"), ("commission_rate", "150")]),
        )
        .unwrap();
        assert_eq!(record.commission_rate, COMMISSION_MAX);

        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "W"), ("price", "1"), ("commission", "12.5%")]),
        )
        .unwrap();
        assert_eq!(record.commission_rate, 12.5);
    }

    #[test]
    fn test_unknown_enum_defaults() {
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", "W"), ("price", "1"), ("category", "mystery"), ("status", "???")]),
        )
        .unwrap();
        assert_eq!(record.category, "other");
        assert_eq!(record.status, "draft");
    }

    #[test]
    fn test_every_row_has_exactly_one_outcome() {
        let rows = vec![
            row(&[("name", "A"), ("price", "1")]),
            row(&[("name", "B"), ("price", "abc")]),
            row(&[("price", "3")]),
        ];
        let outcome = validate_rows(&PRODUCT_SCHEMA, &rows);

        assert_eq!(outcome.valid.len() + outcome.errors.len(), rows.len());
        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn test_row_numbers_offset_for_header() {
        // data row 2 (1-indexed) must report as file row 3
        let rows = vec![
            row(&[("name", "Good"), ("price", "1")]),
            row(&[("name", "Bad"), ("price", "abc")]),
            row(&[("name", "Fine"), ("price", "2")]),
        ];
        let outcome = validate_rows(&PRODUCT_SCHEMA, &rows);

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].row_number, 3);
        assert_eq!(
            outcome.errors[0].raw_row.get("price"),
            Some(&Value::String("abc".to_string()))
        );
    }

    #[test]
    fn test_multiple_field_errors_joined() {
        let errors = validate_row(&PRODUCT_SCHEMA, &row(&[("price", "abc")])).unwrap_err();
        assert_eq!(errors.len(), 2);

        let outcome = validate_rows(&PRODUCT_SCHEMA, &[row(&[("price", "abc")])]);
        assert!(outcome.errors[0].message.contains("name"));
        assert!(outcome.errors[0].message.contains("price"));
    }

    #[test]
    fn test_text_truncated() {
        let long_name = "x".repeat(500);
        let record = validate_row(
            &PRODUCT_SCHEMA,
            &row(&[("name", long_name.as_str()), ("price", "1")]),
        )
        .unwrap();
        assert_eq!(record.name.len(), 200);
    }
}
