//! Text-to-number helpers for the price, review-count and rank fields.
//!
//! Each returns `None` when the text holds no usable value; the extractor
//! decides whether that means a default, a null or a failure.

use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;

/// Strips thousands separators and every kind of whitespace (including
/// non-breaking spaces the storefront puts between digit groups).
fn strip_separators(text: &str) -> String {
    text.chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect()
}

/// Parses a displayed price such as `"1,234"` or `"1 234."` into a decimal.
///
/// A trailing decimal point (the whole-part span often renders one) is
/// dropped. Negative values are rejected.
#[must_use]
pub(crate) fn parse_price(text: &str) -> Option<Decimal> {
    let cleaned = strip_separators(text);
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(cleaned).ok()?;
    if value < Decimal::ZERO {
        return None;
    }
    Some(value)
}

/// Parses the leading number of a review label such as `"2,310 ratings"`.
#[must_use]
pub(crate) fn parse_review_count(text: &str) -> Option<u64> {
    let without_commas: String = text.chars().filter(|c| *c != ',').collect();
    let token = without_commas.split_whitespace().next()?;
    token.parse::<u64>().ok()
}

/// Extracts a rank from a candidate line when it contains `marker`.
///
/// `pattern` must have one capture group around the digits, e.g.
/// `#([\d,]+)`; separators inside the capture are stripped. Rank zero is not
/// a rank.
#[must_use]
pub(crate) fn parse_rank(text: &str, marker: &str, pattern: &Regex) -> Option<u64> {
    if !text.contains(marker) {
        return None;
    }
    let captured = pattern.captures(text)?.get(1)?.as_str();
    let digits = strip_separators(captured);
    digits.parse::<u64>().ok().filter(|rank| *rank > 0)
}

/// Applies a single-capture `pattern` to `text` and returns the trimmed capture.
#[must_use]
pub(crate) fn capture_first(text: &str, pattern: &Regex) -> Option<String> {
    let captured = pattern.captures(text)?.get(1)?.as_str().trim();
    if captured.is_empty() {
        None
    } else {
        Some(captured.to_owned())
    }
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
