//! Shallow query guard.
//!
//! This is a substring check on the upper-cased text, not a parse: it rejects
//! benign text that happens to contain a keyword (`SELECT 'update'`) and it
//! will not catch obfuscated statements. It is not a security boundary.

use serde::Serialize;

use crate::error::ValidationError;

/// Mutating statements refused by [`validate_query`], checked in this order.
pub const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP TABLE",
    "DELETE FROM",
    "UPDATE",
    "INSERT INTO",
    "CREATE TABLE",
    "ALTER TABLE",
    "TRUNCATE",
];

pub fn validate_query(sql: &str) -> Result<(), ValidationError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let upper = trimmed.to_uppercase();
    match DANGEROUS_KEYWORDS.iter().find(|kw| upper.contains(*kw)) {
        Some(&keyword) => Err(ValidationError::Dangerous { keyword }),
        None => Ok(()),
    }
}

/// `{ valid, error }` verdict for callers that render validation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryValidation {
    pub fn check(sql: &str) -> Self {
        validate_query(sql).into()
    }
}

impl From<Result<(), ValidationError>> for QueryValidation {
    fn from(result: Result<(), ValidationError>) -> Self {
        match result {
            Ok(()) => Self {
                valid: true,
                error: None,
            },
            Err(e) => Self {
                valid: false,
                error: Some(e.to_string()),
            },
        }
    }
}
