//! Shared utility functions used across multiple modules.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Serde adapter for nullable text columns: blank strings decode as `None`.
pub fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(normalize_text_option)
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Lowercase and strip every whitespace run, for forgiving name matching.
pub fn squash_whitespace_lowercase(value: &str) -> String {
    WHITESPACE.replace_all(value, "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "deserialize_optional_text")]
        note: Option<String>,
    }

    #[test]
    fn optional_text_column_decodes_blank_as_none() {
        let decode = |value| serde_json::from_value::<Row>(value).unwrap().note;
        assert_eq!(decode(serde_json::json!({ "note": "  " })), None);
        assert_eq!(decode(serde_json::json!({ "note": null })), None);
        assert_eq!(decode(serde_json::json!({})), None);
        assert_eq!(decode(serde_json::json!({ "note": " tea " })), Some("tea".to_string()));
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn squash_whitespace_lowercase_removes_all_runs() {
        assert_eq!(squash_whitespace_lowercase(" Anna  Maria\tNowak "), "annamarianowak");
    }
}
