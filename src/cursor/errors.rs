//! Cursor error types
//!
//! The pipeline fails fast: the first error of any stage aborts the
//! execution and no partial rows are returned.

use thiserror::Error;

use crate::query::QueryError;
use crate::store::StoreError;

/// Result type for cursor execution
pub type CursorResult<T> = Result<T, CursorError>;

/// Errors raised while executing a cursor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    // ==================
    // Source Errors
    // ==================
    /// Propagated verbatim from the candidate source
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A JSON query or sort could not be parsed
    #[error(transparent)]
    QueryParse(#[from] QueryError),

    // ==================
    // Configuration Errors
    // ==================
    /// Aggregate operator is not one of sum, avg, min, max, count, median
    #[error("Unknown aggregate operator: {0}")]
    UnknownAggregateOperator(String),

    /// Aggregate specification has the wrong shape
    #[error("Invalid aggregate specification: {0}")]
    InvalidAggregateSpec(String),

    /// Search term is neither a string nor a pattern
    #[error("Invalid search term: {0}")]
    InvalidSearchTerm(String),

    /// Projection specification is malformed
    #[error("Projection error: {0}")]
    Projection(String),

    // ==================
    // Data Errors
    // ==================
    /// Parent pointers form a cycle
    #[error("Cyclic tree hierarchy at node {0}")]
    CyclicHierarchy(String),
}

impl CursorError {
    /// Stable error code; store errors keep their own
    pub fn code(&self) -> &'static str {
        match self {
            CursorError::Store(err) => err.code(),
            CursorError::QueryParse(err) => err.code(),
            CursorError::UnknownAggregateOperator(_) => "CURSORDB_UNKNOWN_AGGREGATE_OPERATOR",
            CursorError::InvalidAggregateSpec(_) => "CURSORDB_INVALID_AGGREGATE_SPEC",
            CursorError::InvalidSearchTerm(_) => "CURSORDB_INVALID_SEARCH_TERM",
            CursorError::Projection(_) => "CURSORDB_PROJECTION",
            CursorError::CyclicHierarchy(_) => "CURSORDB_CYCLIC_HIERARCHY",
        }
    }

    pub(crate) fn projection(msg: impl Into<String>) -> Self {
        CursorError::Projection(msg.into())
    }
}
