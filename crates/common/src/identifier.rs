//! National identifier handling
//!
//! Identifiers are compared exactly on their cleaned form: ASCII digits plus
//! an upper-case `K` check character. Formatting such as dots, dashes and
//! spaces is dropped.

use serde::Serialize;

/// Keep only digits and `K`/`k`, upper-cased
pub fn clean_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'K' || *c == 'k')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Modulo-11 check character for an identifier base.
///
/// Weights 2..=7 cycle from the rightmost digit. A remainder that maps to 11
/// yields `0` and one that maps to 10 yields `K`. Returns `None` when the base
/// is empty or contains anything but ASCII digits.
pub fn compute_check_digit(base: &str) -> Option<char> {
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut sum = 0u32;
    let mut weight = 2u32;
    for digit in base.chars().rev().filter_map(|c| c.to_digit(10)) {
        sum += digit * weight;
        weight = if weight == 7 { 2 } else { weight + 1 };
    }

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        n => char::from_digit(n, 10),
    }
}

/// Result of checking one identifier's check character
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentifierCheck {
    pub base: String,
    pub check_digit: char,
    pub expected: Option<char>,
}

impl IdentifierCheck {
    pub fn is_valid(&self) -> bool {
        self.expected == Some(self.check_digit)
    }
}

/// Split a full identifier into base and check character and verify it
pub fn check_identifier(full: &str) -> Option<IdentifierCheck> {
    let cleaned = clean_identifier(full);
    let check_digit = cleaned.chars().last()?;
    let base = cleaned[..cleaned.len() - check_digit.len_utf8()].to_string();
    let expected = compute_check_digit(&base);

    Some(IdentifierCheck {
        base,
        check_digit,
        expected,
    })
}

/// Whether the last character of `full` is the correct check character
pub fn validate_identifier(full: &str) -> bool {
    check_identifier(full)
        .map(|check| check.is_valid())
        .unwrap_or(false)
}
