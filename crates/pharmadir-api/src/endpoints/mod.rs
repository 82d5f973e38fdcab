pub mod home;
pub mod pharmacies;
pub mod scrape;
pub mod stats;

/// Lenient numeric query parameter: missing or unparsable falls back to `default`.
pub(crate) fn parse_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}
