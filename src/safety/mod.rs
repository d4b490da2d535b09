//! Read-only query policy.
//!
//! Classifies SQL statements as allowed or rejected before anything is
//! submitted to Athena. Matching is lexical: the leading keyword must be a
//! read-only one and no write/DDL keyword may appear as a whole word. This
//! is a best-effort guard, not a security boundary.

mod validator;

pub use validator::{validate_sql, QueryValidator};

use std::fmt;

/// Leading keywords accepted by the policy.
pub const ALLOWED_LEADING_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN"];

/// Keywords rejected anywhere in a statement, in reporting order.
pub const DISALLOWED_KEYWORDS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "MERGE", "GRANT",
    "REVOKE", "VACUUM",
];

/// The kind of read-only statement detected from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    With,
    Show,
    Describe,
    Explain,
}

impl StatementKind {
    /// Maps an upper-cased leading word to a statement kind.
    pub fn from_leading_word(word: &str) -> Option<Self> {
        match word {
            "SELECT" => Some(Self::Select),
            "WITH" => Some(Self::With),
            "SHOW" => Some(Self::Show),
            "DESCRIBE" => Some(Self::Describe),
            "EXPLAIN" => Some(Self::Explain),
            _ => None,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::With => write!(f, "WITH"),
            Self::Show => write!(f, "SHOW"),
            Self::Describe => write!(f, "DESCRIBE"),
            Self::Explain => write!(f, "EXPLAIN"),
        }
    }
}

/// Why a statement was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Empty or whitespace-only input.
    EmptyQuery,
    /// The statement does not start with a read-only keyword.
    NotReadOnly,
    /// A write/DDL keyword appears as a whole word.
    ForbiddenKeyword(&'static str),
}

impl Rejection {
    /// Returns the stable reason code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EMPTY_QUERY",
            Self::NotReadOnly => "NOT_READ_ONLY",
            Self::ForbiddenKeyword(_) => "FORBIDDEN_KEYWORD",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "Security restriction: Query is empty"),
            Self::NotReadOnly => write!(
                f,
                "Security restriction: Only SELECT, WITH, SHOW, DESCRIBE, and EXPLAIN queries are allowed"
            ),
            Self::ForbiddenKeyword(keyword) => write!(
                f,
                "Security restriction: Query contains disallowed keyword: {keyword}"
            ),
        }
    }
}
