//! Free-text value grammars used by the detail parser

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static COMPACT_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([0-9]+)(?:\.([0-9]+))?\s*([KMB])?\s*$")
        .expect("hardcoded regex pattern is valid")
});

const DATE_FORMATS: [&str; 2] = ["%b %d, %Y", "%B %d, %Y"];

/// Parses counts such as `1,234`, `242.3K`, `1.2M` or `3B`
///
/// Commas are ignored and the suffix is case-insensitive. Fractional
/// results are truncated toward zero. Returns `None` for anything that is
/// not a number or does not fit in a `u64`.
pub fn parse_compact_number(value: &str) -> Option<u64> {
    let text = value.trim().replace(',', "");
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }

    let caps = COMPACT_NUMBER_RE.captures(&text)?;
    let whole: u128 = caps.get(1)?.as_str().parse().ok()?;
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let multiplier: u128 = match caps.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(s) if s == "K" => 1_000,
        Some(s) if s == "M" => 1_000_000,
        Some(s) if s == "B" => 1_000_000_000,
        _ => 1,
    };

    // Digits past the multiplier's precision cannot change the truncated result
    let fraction = &fraction[..fraction.len().min(9)];
    let fraction_value: u128 = if fraction.is_empty() {
        0
    } else {
        fraction.parse().ok()?
    };
    let scale = 10u128.pow(fraction.len() as u32);

    let total = whole
        .checked_mul(multiplier)?
        .checked_add(fraction_value * multiplier / scale)?;
    u64::try_from(total).ok()
}

/// Parses a "first seen" label such as `Jan 5, 2025` or `January 5, 2025`
///
/// Anything else yields `None`.
pub fn parse_first_seen_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(cleaned, format).ok())
}
