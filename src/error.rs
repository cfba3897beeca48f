//! Error taxonomy shared by the pipeline and task services.
//!
//! The store surfaces raw `sqlx` errors; the services translate the
//! interesting ones (unique violations, missing rows) into these typed
//! variants and let the rest flow through as `Database`. The gateway
//! maps each variant onto an HTTP status.

use thiserror::Error;

use crate::models::PermissionError;

/// A typed failure from one of the service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The referenced pipeline or task does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness rule was violated, e.g. re-creating a pipeline.
    #[error("{0}")]
    Conflict(String),

    /// A required field was absent or empty on create.
    #[error("{0}")]
    MissingField(String),

    /// A parameter was structurally valid but out of range.
    #[error("{0}")]
    InvalidArgument(String),

    /// The presented credentials do not permit this operation.
    #[error(transparent)]
    Forbidden(#[from] PermissionError),

    /// An unclassified database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// True when `err` is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// True when `err` is a serialization conflict the caller can retry
/// (SQLSTATE 40001).
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("40001"))
}
