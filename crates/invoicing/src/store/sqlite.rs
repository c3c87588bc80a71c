//! [`Store`] backed by the `database` crate (SQLite via sqlx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::{
    client, invoice, session, user, Client, ClientUpdate, Database, Invoice, InvoiceDetail,
    InvoiceNumber, InvoiceStats, InvoiceUpdate, InvoiceWithClient, NewClient, NewInvoice,
    NewUser, Session, User, UserUpdate,
};

use super::{Store, StoreResult};

/// SQLite persistence adapter.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect, run migrations and wrap the pool.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db = Database::connect(url).await?;
        db.migrate().await?;
        Ok(Self::new(db))
    }

    /// A fresh in-memory database with the schema applied.
    pub async fn in_memory() -> StoreResult<Self> {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        Ok(user::create_user(self.db.pool(), new).await?)
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(user::get_user(self.db.pool(), id).await?)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(user::get_user_by_email(self.db.pool(), email).await?)
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> StoreResult<User> {
        Ok(user::update_user(self.db.pool(), id, update).await?)
    }

    async fn verify_email_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        Ok(user::verify_email_token(self.db.pool(), token, now).await?)
    }

    async fn create_session(&self, new: &Session) -> StoreResult<()> {
        Ok(session::create_session(self.db.pool(), new).await?)
    }

    async fn get_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(session::get_session(self.db.pool(), token_hash).await?)
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(session::delete_session(self.db.pool(), token_hash).await?)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(session::delete_expired_sessions(self.db.pool(), now).await?)
    }

    async fn get_clients_by_user(&self, user_id: &str) -> StoreResult<Vec<Client>> {
        Ok(client::list_clients_by_user(self.db.pool(), user_id).await?)
    }

    async fn get_client_by_id(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(client::get_client(self.db.pool(), id).await?)
    }

    async fn create_client(&self, new: &NewClient) -> StoreResult<Client> {
        Ok(client::create_client(self.db.pool(), new).await?)
    }

    async fn update_client(&self, id: &str, update: &ClientUpdate) -> StoreResult<Client> {
        Ok(client::update_client(self.db.pool(), id, update).await?)
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        Ok(client::delete_client(self.db.pool(), id).await?)
    }

    async fn count_client_invoices(&self, client_id: &str) -> StoreResult<i64> {
        Ok(client::count_client_invoices(self.db.pool(), client_id).await?)
    }

    async fn get_invoices_by_user(&self, user_id: &str) -> StoreResult<Vec<InvoiceWithClient>> {
        Ok(invoice::list_invoices_by_user(self.db.pool(), user_id).await?)
    }

    async fn get_invoice_by_id(&self, id: &str) -> StoreResult<Option<InvoiceDetail>> {
        Ok(invoice::get_invoice_detail(self.db.pool(), id).await?)
    }

    async fn create_invoice(&self, new: &NewInvoice) -> StoreResult<Invoice> {
        Ok(invoice::create_invoice(self.db.pool(), new).await?)
    }

    async fn update_invoice(&self, id: &str, update: &InvoiceUpdate) -> StoreResult<Invoice> {
        Ok(invoice::update_invoice(self.db.pool(), id, update).await?)
    }

    async fn delete_invoice(&self, id: &str) -> StoreResult<()> {
        Ok(invoice::delete_invoice(self.db.pool(), id).await?)
    }

    async fn peek_next_invoice_number(&self, user_id: &str) -> StoreResult<InvoiceNumber> {
        Ok(invoice::peek_next_invoice_number(self.db.pool(), user_id).await?)
    }

    async fn invoice_stats(&self, user_id: &str) -> StoreResult<InvoiceStats> {
        Ok(invoice::invoice_stats(self.db.pool(), user_id).await?)
    }
}
