//! Name normalization for equality comparisons
//!
//! Only names go through here. Identifiers are compared exactly on their
//! cleaned form (see [`crate::identifier`]).

use unicode_normalization::UnicodeNormalization;

/// Canonical form of a display name: upper-cased, canonically decomposed,
/// combining diacritical marks (U+0300..=U+036F) removed, ends trimmed.
///
/// Trimming runs last so a stray mark next to whitespace cannot leave a
/// trailing space behind; this keeps the function idempotent.
pub fn normalize(text: &str) -> String {
    text.to_uppercase()
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Compare two names after normalization
pub fn names_equal(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}
