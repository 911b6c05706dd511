//! Index error types

use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by index maintenance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// A write would store a second document under a unique key
    #[error("Unique constraint violated on field '{field}' for value {value}")]
    UniqueConflict { field: String, value: String },

    /// Existing data already holds duplicate keys for a new unique index
    #[error("Cannot create unique index on field '{field}': duplicate value {value}")]
    UniqueSetup { field: String, value: String },
}

impl IndexError {
    /// Field the error refers to
    pub fn field(&self) -> &str {
        match self {
            IndexError::UniqueConflict { field, .. } | IndexError::UniqueSetup { field, .. } => {
                field
            }
        }
    }
}
