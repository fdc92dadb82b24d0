//! Answer extraction from free-text model responses.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A choice letter standing alone as a word.
    static ref CHOICE_PATTERN: Regex = Regex::new(r"\b([ABCD])\b").unwrap();
}

/// Extract the first standalone choice letter from a response.
///
/// Matching is case-insensitive and the letter must not be part of a
/// longer alphanumeric run, so `"AB"` or `"Bob"` yield nothing. A `None`
/// is an absent prediction, not a failure.
pub fn extract(text: &str) -> Option<char> {
    let upper = text.to_uppercase();
    CHOICE_PATTERN
        .captures(&upper)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().chars().next())
}
