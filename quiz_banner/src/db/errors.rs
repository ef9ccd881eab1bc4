//! Persistence error types.

use thiserror::Error;

/// Repository errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored value could not be decoded into the domain type
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Map unique-violation database errors to [`StoreError::Conflict`]
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if is_unique {
            StoreError::Conflict(what.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

/// Result type for repository operations
pub type StoreResult<T> = Result<T, StoreError>;
