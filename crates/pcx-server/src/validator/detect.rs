//! Column auto-detection
//!
//! Suggests a header-to-field mapping from sample headers alone. Pure
//! pattern matching with no I/O, so the UI can call it on a file preview
//! before any job exists.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Detection patterns, one per target field. First match wins.
fn patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            [
                ("name", r"^(product_?)?(name|title)$"),
                ("sku", r"^(sku|product_?code|item_?(no|num|number|code))$"),
                ("description", r"^(desc(ription)?|details|summary)$"),
                ("price", r"^(unit_?)?(price|cost|amount)$"),
                ("category", r"^(product_?)?categor(y|ies)(_name)?$"),
                ("stock", r"^(stock(_?quantity)?|qty|quantity|inventory)$"),
                ("commission_rate", r"^commission(_?rate|_?pct)?$"),
                ("status", r"^(status|state)$"),
            ]
            .into_iter()
            .filter_map(|(field, pattern)| Regex::new(pattern).ok().map(|re| (field, re)))
            .collect()
        })
        .as_slice()
}

/// Suggest a mapping from each recognizable header to a schema field.
///
/// Headers that match nothing are omitted; the first header matching a
/// field claims it, so duplicates do not produce conflicting suggestions.
pub fn detect_columns(headers: &[String]) -> HashMap<String, String> {
    let mut suggestions: HashMap<String, String> = HashMap::new();
    let mut claimed: Vec<&str> = Vec::new();

    for header in headers {
        let candidate = header.trim().to_ascii_lowercase();
        for (field, pattern) in patterns() {
            if claimed.contains(field) {
                continue;
            }
            if pattern.is_match(&candidate) {
                suggestions.insert(header.clone(), field.to_string());
                claimed.push(*field);
                break;
            }
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detects_common_headers() {
        let suggested = detect_columns(&headers(&["product_name", "cost", "qty", "state"]));

        assert_eq!(suggested["product_name"], "name");
        assert_eq!(suggested["cost"], "price");
        assert_eq!(suggested["qty"], "stock");
        assert_eq!(suggested["state"], "status");
    }

    #[test]
    fn test_unrecognized_headers_omitted() {
        let suggested = detect_columns(&headers(&["frobnicator", "price"]));

        assert!(!suggested.contains_key("frobnicator"));
        assert_eq!(suggested["price"], "price");
    }

    #[test]
    fn test_first_match_claims_field() {
        let suggested = detect_columns(&headers(&["price", "cost"]));

        assert_eq!(suggested["price"], "price");
        assert!(!suggested.contains_key("cost"));
    }

    #[test]
    fn test_empty_headers() {
        assert!(detect_columns(&[]).is_empty());
    }

    #[test]
    fn test_detection_is_case_insensitive_on_trimmed_input() {
        let suggested = detect_columns(&headers(&[" SKU ", "Description"]));
        assert_eq!(suggested[" SKU "], "sku");
        assert_eq!(suggested["Description"], "description");
    }
}
