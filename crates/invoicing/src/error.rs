//! Error types for the domain services.

use std::fmt;

use database::{InvoiceStatus, ValidationError};
use mailer::MailerError;
use thiserror::Error;

use crate::pdf::RenderError;
use crate::storage::StorageError;
use crate::store::StoreError;

/// Step of the send workflow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    Render,
    Storage,
    Mail,
    Persistence,
}

impl SendStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendStep::Render => "render",
            SendStep::Storage => "storage",
            SendStep::Mail => "mail",
            SendStep::Persistence => "persistence",
        }
    }
}

impl fmt::Display for SendStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the domain services.
#[derive(Debug, Error)]
pub enum InvoicingError {
    #[error("{0}")]
    Validation(String),

    /// Absent, or owned by someone else.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("cannot change invoice status from {from} to {to}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("please verify your email before signing in")]
    EmailNotVerified,

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("send failed at {step} step: {source}")]
    Send {
        step: SendStep,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Mail(#[from] MailerError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

impl InvoicingError {
    pub fn validation(message: impl Into<String>) -> Self {
        InvoicingError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        InvoicingError::NotFound { entity }
    }

    /// Wrap a failure of one send workflow step.
    pub fn send(step: SendStep, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        InvoicingError::Send {
            step,
            source: Box::new(source),
        }
    }

    /// The failing send step, if this is a send failure.
    pub fn send_step(&self) -> Option<SendStep> {
        match self {
            InvoicingError::Send { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<StoreError> for InvoicingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, .. } => InvoicingError::NotFound { entity },
            StoreError::AlreadyExists { entity, .. } => {
                InvoicingError::Conflict(format!("{entity} already exists"))
            }
            other => InvoicingError::Store(other),
        }
    }
}

impl From<ValidationError> for InvoicingError {
    fn from(err: ValidationError) -> Self {
        InvoicingError::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InvoicingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        let err: InvoicingError = StoreError::not_found("Invoice", "inv-1").into();
        assert!(matches!(err, InvoicingError::NotFound { entity: "Invoice" }));

        let err: InvoicingError = StoreError::AlreadyExists {
            entity: "User",
            id: "a@acme.com".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "User already exists");

        let err: InvoicingError = StoreError::Backend("disk full".to_string()).into();
        assert!(matches!(err, InvoicingError::Store(_)));
    }

    #[test]
    fn test_send_error_keeps_step() {
        let err = InvoicingError::send(SendStep::Mail, MailerError::Delivery("535".to_string()));
        assert_eq!(err.send_step(), Some(SendStep::Mail));
        assert!(err.to_string().starts_with("send failed at mail step"));
    }
}
