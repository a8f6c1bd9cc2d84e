//! Utility functions and helpers.

pub mod http;
pub mod parse;
pub mod sync;

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

pub use parse::{parse_datetime, parse_hours, parse_size_bytes};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Extract a numeric id from a query parameter such as `?id=123` or `&pmid=5`.
pub fn extract_query_id(href: &str, keys: &[&str]) -> Option<String> {
    let pattern = format!(r"(?i)[?&](?:{})=(\d+)", keys.join("|"));
    let re = Regex::new(&pattern).ok()?;
    re.captures(href)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

static BRACKET_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|【[^】]*】").expect("static regex")
});

/// Title without bracketed tags like `[Free]` or `【官方】`.
pub fn clean_title(raw: &str) -> Option<String> {
    let stripped = BRACKET_TAG.replace_all(raw, " ");
    let cleaned = normalize_whitespace(&stripped);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Cut text to at most `max` grapheme clusters.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

/// Short stable fingerprint of a list of fields.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
