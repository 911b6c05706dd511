//! Query error types

use thiserror::Error;

/// Result type for query construction
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while turning JSON into a typed query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Query must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("Unknown query operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{operator}' expects {expected}")]
    InvalidOperand {
        operator: String,
        expected: &'static str,
    },

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },
}

impl QueryError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        "CURSORDB_QUERY_PARSE"
    }

    pub(crate) fn operand(operator: &str, expected: &'static str) -> Self {
        QueryError::InvalidOperand {
            operator: operator.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = QueryError::operand("$in", "an array");
        assert_eq!(err.to_string(), "Operator '$in' expects an array");
        assert_eq!(err.code(), "CURSORDB_QUERY_PARSE");
    }
}
