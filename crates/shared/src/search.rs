//! In-memory search over the currently loaded page of strings

use crate::records::TennisString;

/// Text the search query is matched against: brand, model, material, gauge
/// and color joined by spaces, absent fields skipped.
pub fn search_text(string: &TennisString) -> String {
    [
        string.brand.as_deref(),
        Some(string.model.as_str()),
        string.material.as_deref(),
        string.gauge.as_deref(),
        string.color.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// A whitespace-only query matches everything; otherwise the query is used
/// as typed, surrounding spaces included.
pub fn matches(query: &str, string: &TennisString) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    search_text(string)
        .to_lowercase()
        .contains(&query.to_lowercase())
}

/// Case-insensitive substring filter. A blank query returns the list as is.
pub fn filter_strings(query: &str, strings: &[TennisString]) -> Vec<TennisString> {
    strings
        .iter()
        .filter(|string| matches(query, string))
        .cloned()
        .collect()
}
