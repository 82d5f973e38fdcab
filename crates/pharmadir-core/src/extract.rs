//! Contact field extraction from free-form listing text.
//!
//! Ivorian numbers show up in three shapes: with the `+225` prefix, with a
//! bare `225` country code, or as a local number. Each shape accepts modern
//! two-digit grouping (`27 22 12 34`, `27 22 12 34 56`) and the legacy
//! `XX XXX XXX` grouping.

use std::sync::OnceLock;

use regex::Regex;

fn phone_patterns() -> &'static [Regex; 3] {
    static RE: OnceLock<[Regex; 3]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"\+225(?:(?:\s?\d{2}){4,5}|\s?\d{2}\s?\d{3}\s?\d{3})\b").expect("valid regex"),
            Regex::new(r"\b225(?:(?:\s?\d{2}){4,5}|\s?\d{2}\s?\d{3}\s?\d{3})\b").expect("valid regex"),
            Regex::new(r"\b(?:\d{2}(?:\s?\d{2}){3,4}|\d{2}\s?\d{3}\s?\d{3})\b").expect("valid regex"),
        ]
    })
}

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex"))
}

/// First phone number found in `text`, with internal whitespace removed.
///
/// Patterns are tried in order (international, country code, local); the
/// first pattern that matches anywhere wins.
pub fn extract_phone(text: &str) -> Option<String> {
    phone_patterns()
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str().split_whitespace().collect())
}

/// First email address found in `text`.
pub fn extract_email(text: &str) -> Option<String> {
    re_email().find(text).map(|m| m.as_str().to_string())
}
