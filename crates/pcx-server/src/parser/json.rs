//! JSON parsing for array-of-flat-objects payloads

use super::{normalize_header, scrub_cell, NormalizedRow, ParseError, ParseLimits, ParsedUpload};
use serde_json::Value;

/// Parse a JSON document into normalized rows.
///
/// The top level must be an array; each element must be a flat object
/// (scalar values only). Keys are normalized exactly like CSV headers.
/// Records beyond `max_rows` are silently excluded.
pub fn parse_json(bytes: &[u8], limits: &ParseLimits) -> Result<ParsedUpload, ParseError> {
    if bytes.is_empty() {
        return Err(ParseError::Empty);
    }
    if bytes.len() > limits.max_text_bytes {
        return Err(ParseError::TooLarge {
            limit_bytes: limits.max_text_bytes,
        });
    }

    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed(format!("JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(ParseError::NotAnArray);
    };

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<NormalizedRow> = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        if rows.len() >= limits.max_rows {
            break;
        }

        let Value::Object(object) = item else {
            return Err(ParseError::NotFlat(index + 1));
        };

        let mut row = NormalizedRow::with_capacity(object.len());
        for (raw_key, raw_value) in object {
            let scalar = match raw_value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ParseError::NotFlat(index + 1));
                }
            };

            let Some(key) = normalize_header(&raw_key)? else {
                continue;
            };

            if !headers.contains(&key) {
                if headers.len() >= limits.max_columns {
                    return Err(ParseError::TooManyColumns {
                        found: headers.len() + 1,
                        limit: limits.max_columns,
                    });
                }
                headers.push(key.clone());
            }

            row.insert(key, scrub_cell(&scalar, limits));
        }

        if row.is_empty() {
            continue;
        }
        rows.push(row);
    }

    if headers.is_empty() {
        return Err(ParseError::NoHeader);
    }

    Ok(ParsedUpload { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ParseLimits {
        ParseLimits::default()
    }

    #[test]
    fn test_parse_basic_json() {
        let data = br#"[
            {"Product Name": "Widget", "Price": 9.99},
            {"Product Name": "Gadget", "Price": "12.50"}
        ]"#;
        let parsed = parse_json(data, &limits()).unwrap();

        assert_eq!(parsed.headers, vec!["product_name", "price"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0]["price"], "9.99");
        assert_eq!(parsed.rows[1]["product_name"], "Gadget");
    }

    #[test]
    fn test_non_array_top_level_rejected() {
        let data = br#"{"name": "Widget"}"#;
        assert!(matches!(
            parse_json(data, &limits()),
            Err(ParseError::NotAnArray)
        ));
    }

    #[test]
    fn test_nested_object_rejected() {
        let data = br#"[{"name": "Widget", "meta": {"a": 1}}]"#;
        assert!(matches!(
            parse_json(data, &limits()),
            Err(ParseError::NotFlat(1))
        ));
    }

    #[test]
    fn test_null_becomes_empty_string() {
        let data = br#"[{"name": "Widget", "sku": null}]"#;
        let parsed = parse_json(data, &limits()).unwrap();
        assert_eq!(parsed.rows[0]["sku"], "");
    }

    #[test]
    fn test_records_beyond_cap_silently_excluded() {
        let items: Vec<String> = (0..12_000)
            .map(|i| format!(r#"{{"name": "item{i}"}}"#))
            .collect();
        let data = format!("[{}]", items.join(","));

        let capped = ParseLimits {
            max_rows: 10_000,
            ..ParseLimits::default()
        };
        let parsed = parse_json(data.as_bytes(), &capped).unwrap();
        assert_eq!(parsed.rows.len(), 10_000);
    }

    #[test]
    fn test_dangerous_key_rejected() {
        let data = br#"[{"__proto__": "x"}]"#;
        assert!(matches!(
            parse_json(data, &limits()),
            Err(ParseError::ForbiddenColumn(_))
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let data = b"[{\"name\": ";
        assert!(matches!(
            parse_json(data, &limits()),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_string_values_sanitized() {
        let data = br#"[{"name": "=HYPERLINK(evil)", "notes": "javascript:alert(1)"}]"#;
        let parsed = parse_json(data, &limits()).unwrap();
        assert_eq!(parsed.rows[0]["name"], "'=HYPERLINK(evil)");
        assert_eq!(parsed.rows[0]["notes"], "alert(1)");
    }
}
