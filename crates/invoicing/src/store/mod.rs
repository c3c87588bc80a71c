//! Persistence contract and its adapters.
//!
//! Handlers and workflows only ever talk to [`Store`]; the concrete adapter
//! ([`SqliteStore`] or [`MemoryStore`]) is chosen once at startup.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::{
    Client, ClientUpdate, DatabaseError, Invoice, InvoiceDetail, InvoiceNumber, InvoiceStats,
    InvoiceStatus, InvoiceUpdate, InvoiceWithClient, NewClient, NewInvoice, NewUser, NumberingError, Session,
    User, UserUpdate,
};
use thiserror::Error;

/// Errors returned by a [`Store`] adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    /// A referential constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A conditional update found the invoice in another status.
    #[error("invoice status is {actual}, expected {expected}")]
    StatusChanged {
        expected: InvoiceStatus,
        actual: InvoiceStatus,
    },

    #[error(transparent)]
    Numbering(#[from] NumberingError),

    /// Anything the backend could not do (connection, query, I/O).
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            DatabaseError::AlreadyExists { entity, id } => StoreError::AlreadyExists { entity, id },
            DatabaseError::StatusChanged {
                expected, actual, ..
            } => StoreError::StatusChanged { expected, actual },
            DatabaseError::Numbering(e) => StoreError::Numbering(e),
            err @ DatabaseError::Constraint { .. } => StoreError::Constraint(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the domain services.
///
/// Multi-row writes (`create_invoice`, `update_invoice`, `delete_invoice`)
/// are atomic: either every row is written or none is.
#[async_trait]
pub trait Store: Send + Sync {
    // Users

    async fn create_user(&self, new: &NewUser) -> StoreResult<User>;

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: &str, update: &UserUpdate) -> StoreResult<User>;

    /// Consume a verification token: clear it and stamp the verification
    /// time. Returns `None` if the token is unknown, used or expired.
    async fn verify_email_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>>;

    // Sessions

    async fn create_session(&self, session: &Session) -> StoreResult<()>;

    async fn get_session(&self, token_hash: &str) -> StoreResult<Option<Session>>;

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool>;

    /// Remove every session that expired at or before `now`. Returns how
    /// many were removed.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    // Clients

    async fn get_clients_by_user(&self, user_id: &str) -> StoreResult<Vec<Client>>;

    async fn get_client_by_id(&self, id: &str) -> StoreResult<Option<Client>>;

    async fn create_client(&self, new: &NewClient) -> StoreResult<Client>;

    async fn update_client(&self, id: &str, update: &ClientUpdate) -> StoreResult<Client>;

    /// Delete a client. Callers check [`Store::count_client_invoices`] first.
    async fn delete_client(&self, id: &str) -> StoreResult<()>;

    async fn count_client_invoices(&self, client_id: &str) -> StoreResult<i64>;

    // Invoices

    /// A user's invoices, newest first, each with its client.
    async fn get_invoices_by_user(&self, user_id: &str) -> StoreResult<Vec<InvoiceWithClient>>;

    /// An invoice with its client and items.
    async fn get_invoice_by_id(&self, id: &str) -> StoreResult<Option<InvoiceDetail>>;

    /// Allocate the next number and write the invoice with its items.
    async fn create_invoice(&self, new: &NewInvoice) -> StoreResult<Invoice>;

    /// Apply a partial update. Fails with [`StoreError::StatusChanged`],
    /// writing nothing, when `update.expected_status` no longer matches.
    async fn update_invoice(&self, id: &str, update: &InvoiceUpdate) -> StoreResult<Invoice>;

    /// Delete an invoice and all of its items.
    async fn delete_invoice(&self, id: &str) -> StoreResult<()>;

    /// The number the next `create_invoice` would allocate.
    async fn peek_next_invoice_number(&self, user_id: &str) -> StoreResult<InvoiceNumber>;

    async fn invoice_stats(&self, user_id: &str) -> StoreResult<InvoiceStats>;
}
