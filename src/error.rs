//! Error types for the stakeholder directory.
//!
//! Three caller-visible failure classes: validation (rejected before any
//! query executes), not-found (unknown logical id), and persistence
//! (storage/transport). Child-collection decode failures surface as their
//! own variant since they indicate a schema/projection mismatch rather than
//! bad caller input.

use thiserror::Error;

/// Directory operation errors
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("validation failed: {details}")]
    Validation { details: String },

    #[error("stakeholder not found: {id}")]
    NotFound { id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DirectoryError {
    /// Convenience constructor for validation failures.
    pub fn validation(details: impl Into<String>) -> Self {
        Self::Validation {
            details: details.into(),
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = DirectoryError::validation("name must not be empty");
        assert_eq!(
            err.to_string(),
            "validation failed: name must not be empty"
        );
    }

    #[test]
    fn test_not_found_display() {
        let err = DirectoryError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "stakeholder not found: 42");
    }

    #[test]
    fn test_from_sqlx_error() {
        let err: DirectoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DirectoryError::Database(_)));
    }
}
