//! Input validators and normalizers for the collection steps.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Minimum characters in a normalized name.
pub const MIN_NAME_LEN: usize = 2;

/// Minimum digits in a phone number (area code + number).
pub const MIN_PHONE_DIGITS: usize = 10;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static YES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(sim|confere|correto|ok)\b").unwrap());

static NO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(nao|não|errado|corrigir)\b").unwrap());

/// Fold text for keyword matching: NFD-decompose, drop combining marks,
/// trim, lowercase. "Tributária" and "tributaria" fold to the same string.
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Collapse whitespace runs into single spaces and trim.
///
/// Returns `None` when the result is shorter than [`MIN_NAME_LEN`] characters.
pub fn normalize_name(input: &str) -> Option<String> {
    let name = input.split_whitespace().collect::<Vec<_>>().join(" ");
    (name.chars().count() >= MIN_NAME_LEN).then_some(name)
}

/// Validate an email address against a basic `local@domain.tld` shape.
///
/// Returns the trimmed address when valid.
pub fn normalize_email(input: &str) -> Option<String> {
    let email = input.trim();
    EMAIL_RE.is_match(email).then(|| email.to_string())
}

/// Keep only the digits of a phone number.
///
/// Returns `None` when fewer than [`MIN_PHONE_DIGITS`] digits remain.
pub fn extract_phone(input: &str) -> Option<String> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

/// Whether the answer contains an affirmative keyword as a whole word.
pub fn is_affirmative(input: &str) -> bool {
    YES_RE.is_match(input)
}

/// Whether the answer contains a negative keyword as a whole word.
pub fn is_negative(input: &str) -> bool {
    NO_RE.is_match(input)
}
