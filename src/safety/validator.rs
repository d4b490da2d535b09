//! Keyword-based statement validation.

use std::sync::OnceLock;

use regex::Regex;

use super::{Rejection, StatementKind, DISALLOWED_KEYWORDS};

/// Validator enforcing the read-only policy.
///
/// Holds no state between calls; the compiled keyword patterns are shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryValidator;

impl QueryValidator {
    /// Creates a new validator.
    pub fn new() -> Self {
        Self
    }

    /// Validates a statement, returning the detected statement kind.
    ///
    /// Checks run in order: empty input, leading keyword, then forbidden
    /// keywords anywhere in the text (so `SELECT 1; DROP TABLE t` is caught).
    pub fn validate(&self, statement: &str) -> Result<StatementKind, Rejection> {
        let normalized = statement.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(Rejection::EmptyQuery);
        }

        let kind =
            StatementKind::from_leading_word(leading_word(&normalized)).ok_or(Rejection::NotReadOnly)?;

        if let Some(keyword) = find_forbidden_keyword(&normalized) {
            return Err(Rejection::ForbiddenKeyword(keyword));
        }

        Ok(kind)
    }
}

/// Convenience function to validate SQL without creating a validator instance.
pub fn validate_sql(statement: &str) -> Result<StatementKind, Rejection> {
    QueryValidator::new().validate(statement)
}

/// Returns the first word of an already-trimmed statement.
fn leading_word(normalized: &str) -> &str {
    let end = normalized
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(normalized.len());
    &normalized[..end]
}

fn keyword_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        DISALLOWED_KEYWORDS
            .iter()
            .filter_map(|keyword| {
                Regex::new(&format!(r"\b{keyword}\b"))
                    .ok()
                    .map(|pattern| (*keyword, pattern))
            })
            .collect()
    })
}

/// Finds the first disallowed keyword (in policy order) present as a whole word.
fn find_forbidden_keyword(normalized: &str) -> Option<&'static str> {
    keyword_patterns()
        .iter()
        .find(|(_, pattern)| pattern.is_match(normalized))
        .map(|(keyword, _)| *keyword)
}
