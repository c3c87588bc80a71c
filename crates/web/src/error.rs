//! Error types for the HTTP layer.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use invoicing::storage::StorageError;
use invoicing::InvoicingError;
use thiserror::Error;

/// Errors that can occur while handling a request.
#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Invoicing(#[from] InvoicingError),

    /// Raised by the storage routes.
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        WebError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

const INTERNAL: &str = "Internal server error";

impl WebError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            WebError::Invoicing(err) => invoicing_status(err),
            WebError::Storage(err) => storage_status(err),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            WebError::Template(err) => {
                tracing::error!(error = %err, "Template error");
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
        }
    }
}

fn invoicing_status(err: &InvoicingError) -> (StatusCode, String) {
    let status = match err {
        InvoicingError::Validation(_)
        | InvoicingError::InvalidToken
        | InvoicingError::Conflict(_) => StatusCode::BAD_REQUEST,
        InvoicingError::NotFound { .. } => StatusCode::NOT_FOUND,
        InvoicingError::InvalidTransition { .. } => StatusCode::CONFLICT,
        InvoicingError::InvalidCredentials | InvoicingError::Unauthenticated => StatusCode::UNAUTHORIZED,
        InvoicingError::EmailNotVerified => StatusCode::FORBIDDEN,
        InvoicingError::Send { step, source } => {
            tracing::error!(%step, error = %source, "Invoice send failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to send invoice ({step} step)"),
            );
        }
        InvoicingError::Store(_)
        | InvoicingError::Storage(_)
        | InvoicingError::Mail(_)
        | InvoicingError::Render(_)
        | InvoicingError::Template(_)
        | InvoicingError::PasswordHash(_) => {
            tracing::error!(error = %err, "Request failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string());
        }
    };
    (status, err.to_string())
}

fn storage_status(err: &StorageError) -> (StatusCode, String) {
    let status = match err {
        StorageError::NotFound { .. } | StorageError::UnknownBucket(_) => StatusCode::NOT_FOUND,
        StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        StorageError::InvalidSignature | StorageError::Expired => StatusCode::FORBIDDEN,
        StorageError::Io(_) | StorageError::Backend(_) => {
            tracing::error!(error = %err, "Storage error");
            return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string());
        }
    };
    (status, err.to_string())
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;
    use database::InvoiceStatus;
    use invoicing::SendStep;

    fn status_of(err: impl Into<WebError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_of(InvoicingError::validation("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(InvoicingError::not_found("Invoice")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(InvoicingError::Conflict("client has invoices".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(InvoicingError::InvalidTransition {
                from: InvoiceStatus::Draft,
                to: InvoiceStatus::Paid,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(InvoicingError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(InvoicingError::EmailNotVerified), StatusCode::FORBIDDEN);
        assert_eq!(status_of(WebError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(StorageError::InvalidSignature), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(StorageError::UnknownBucket("secrets".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_downstream_failures_hide_details() {
        let err = InvoicingError::send(
            SendStep::Mail,
            mailer::MailerError::Delivery("535 auth failed for user@corp".to_string()),
        );
        let (status, message) = WebError::from(err).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Failed to send invoice (mail step)");

        let (_, message) = WebError::from(StorageError::Backend("disk".into())).status_and_message();
        assert_eq!(message, INTERNAL);
    }
}
