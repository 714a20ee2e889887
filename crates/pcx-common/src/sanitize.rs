//! Sanitization of untrusted catalog data
//!
//! Every string that enters the system through an uploaded file passes
//! through these filters before it is validated, persisted, or re-exported.
//! The filters defend against three classes of abuse:
//!
//! - markup/script injection when values are later rendered or embedded
//!   (`clean_value` strips control characters, `<>'"&`, and
//!   `javascript:`/`data:`/`vbscript:` scheme prefixes),
//! - prototype pollution via attacker-controlled column names
//!   (`is_dangerous_key`),
//! - spreadsheet formula injection when values are re-opened in spreadsheet
//!   software (`defuse_formula`).
//!
//! All functions are pure and allocation-light; they are used from the
//! parser hot loop.

/// Maximum length of a normalized column key, in characters.
pub const MAX_KEY_CHARS: usize = 50;

/// Property names that must never become record keys.
///
/// A crafted header row could otherwise smuggle keys that collide with
/// object-prototype members in downstream JSON consumers.
const DANGEROUS_KEYS: &[&str] = &[
    "__proto__",
    "constructor",
    "prototype",
    "__definegetter__",
    "__definesetter__",
    "__lookupgetter__",
    "__lookupsetter__",
];

/// URI scheme prefixes removed from cell values.
const BLOCKED_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:"];

/// Returns true when `key` matches a dangerous prototype property name.
pub fn is_dangerous_key(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    DANGEROUS_KEYS.contains(&lowered.as_str())
}

/// Normalize a raw column header into a canonical key.
///
/// Lowercases, converts separator runs (whitespace, `-`, `.`, `/`) to a
/// single underscore, strips every other non-alphanumeric character, and
/// truncates to [`MAX_KEY_CHARS`]. `"Product Name"` becomes
/// `"product_name"`; `" Price ($) "` becomes `"price"`.
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_KEY_CHARS));
    let mut pending_sep = false;

    for ch in raw.trim().chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
            if out.chars().count() >= MAX_KEY_CHARS {
                break;
            }
        } else if matches!(ch, ' ' | '\t' | '-' | '_' | '.' | '/') {
            pending_sep = true;
        }
        // every other character is dropped
    }

    out
}

/// Strip control characters, markup metacharacters, and blocked URI scheme
/// prefixes from a cell value.
pub fn clean_value(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|ch| !ch.is_control() && !matches!(ch, '<' | '>' | '\'' | '"' | '&'))
        .collect();

    // Scheme prefixes are removed repeatedly so nesting cannot sneak one
    // through (e.g. "javascript:javascript:alert(1)").
    loop {
        let start = cleaned.len() - cleaned.trim_start().len();
        let lowered = cleaned[start..].to_ascii_lowercase();
        let Some(scheme) = BLOCKED_SCHEMES.iter().find(|s| lowered.starts_with(**s)) else {
            break;
        };
        cleaned = cleaned[start + scheme.len()..].to_string();
    }

    cleaned.trim().to_string()
}

/// Prefix a value with a quote when it would be interpreted as a formula by
/// spreadsheet software (`=`, `+`, `-`, `@` lead bytes).
pub fn defuse_formula(value: &str) -> String {
    match value.chars().next() {
        Some('=') | Some('+') | Some('-') | Some('@') => format!("'{value}"),
        _ => value.to_string(),
    }
}

/// Truncate a string to at most `max_chars` characters, respecting char
/// boundaries.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect()
}
