//! Store error types

use thiserror::Error;

use crate::index::IndexError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the datastore and candidate sources
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    // ==================
    // Constraint Errors
    // ==================
    /// A write conflicts with a unique index
    #[error("Unique constraint violated on field '{field}' for value {value}")]
    UniqueConstraintViolation { field: String, value: String },

    /// A unique index can not be built over existing data
    #[error("Cannot create unique index on '{field}': duplicate value {value}")]
    UniqueConstraintSetup { field: String, value: String },

    // ==================
    // Input Errors
    // ==================
    /// Document is not a JSON object or carries an unusable `_id`
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Configuration could not be read or failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    // ==================
    // Internal Errors
    // ==================
    /// A writer panicked while holding the store lock
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::UniqueConstraintViolation { .. } => "CURSORDB_UNIQUE_CONSTRAINT_VIOLATION",
            StoreError::UniqueConstraintSetup { .. } => "CURSORDB_UNIQUE_CONSTRAINT_SETUP",
            StoreError::InvalidDocument(_) => "CURSORDB_INVALID_DOCUMENT",
            StoreError::Config(_) => "CURSORDB_CONFIG",
            StoreError::LockPoisoned => "CURSORDB_LOCK_POISONED",
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        StoreError::Config(msg.into())
    }
}

impl From<IndexError> for StoreError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::UniqueConflict { field, value } => {
                StoreError::UniqueConstraintViolation { field, value }
            }
            IndexError::UniqueSetup { field, value } => {
                StoreError::UniqueConstraintSetup { field, value }
            }
        }
    }
}
