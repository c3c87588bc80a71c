//! Database error types.

use thiserror::Error;

use crate::models::InvoiceStatus;
use crate::numbering::NumberingError;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (connection, query, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A foreign key rejected the write
    #[error("{entity} {id} is still referenced or references a missing row")]
    Constraint { entity: &'static str, id: String },

    /// A conditional status change found a different status
    #[error("invoice {id} is {actual}, expected {expected}")]
    StatusChanged {
        id: String,
        expected: InvoiceStatus,
        actual: InvoiceStatus,
    },

    /// Invoice number could not be derived
    #[error("invoice numbering failed: {0}")]
    Numbering(#[from] NumberingError),
}

impl DatabaseError {
    /// Map constraint violations on a write to `AlreadyExists` or
    /// `Constraint`, anything else to `Sqlx`.
    pub(crate) fn from_write(err: sqlx::Error, entity: &'static str, id: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity,
                    id: id.to_string(),
                };
            }
            if db_err.is_foreign_key_violation() {
                return DatabaseError::Constraint {
                    entity,
                    id: id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(err)
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
