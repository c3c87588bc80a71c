//! Fixtures shared by the unit tests.

use std::sync::Arc;

use chrono::{Duration, Utc};
use database::{Database, NewUser, User};
use tempfile::TempDir;

use crate::clients::ClientRequest;
use crate::storage::UrlSigner;
use crate::store::{MemoryStore, SqliteStore, Store};

pub(crate) const PUBLIC_URL: &str = "http://localhost:3000";

pub(crate) fn signer() -> UrlSigner {
    UrlSigner::new(PUBLIC_URL, "test-secret", Duration::hours(2))
}

/// A verified user.
pub(crate) async fn seed_user(store: &dyn Store, email: &str) -> User {
    let token = format!("verify-{email}");
    store
        .create_user(&NewUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            name: Some("Alice".to_string()),
            verification_token: Some(token.clone()),
            verification_expires_at: None,
        })
        .await
        .unwrap();
    store
        .verify_email_token(&token, Utc::now())
        .await
        .unwrap()
        .unwrap()
}

pub(crate) fn acme() -> ClientRequest {
    ClientRequest {
        company_name: Some("Acme".to_string()),
        contact_name: Some("Wile E.".to_string()),
        email: Some("a@acme.com".to_string()),
        ..ClientRequest::default()
    }
}

enum Backend {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

/// One store adapter under test. Service tests run against each of them.
pub(crate) struct TestStore {
    backend: Backend,
    // Keeps the SQLite file alive.
    _dir: Option<TempDir>,
}

impl TestStore {
    pub(crate) fn memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryStore::new()),
            _dir: None,
        }
    }

    /// File-backed so the pool can hand out several connections.
    pub(crate) async fn sqlite() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("invgen.db").display());
        let db = Database::connect_with_pool_size(&url, 4).await.unwrap();
        db.migrate().await.unwrap();
        Self {
            backend: Backend::Sqlite(SqliteStore::new(db)),
            _dir: Some(dir),
        }
    }

    pub(crate) async fn all() -> Vec<Self> {
        vec![Self::memory(), Self::sqlite().await]
    }

    pub(crate) fn name(&self) -> &'static str {
        match &self.backend {
            Backend::Memory(_) => "memory",
            Backend::Sqlite(_) => "sqlite",
        }
    }

    pub(crate) fn store(&self) -> Arc<dyn Store> {
        match &self.backend {
            Backend::Memory(store) => Arc::new(store.clone()),
            Backend::Sqlite(store) => Arc::new(store.clone()),
        }
    }

    /// Invoice item rows across all invoices.
    pub(crate) async fn item_count(&self) -> usize {
        match &self.backend {
            Backend::Memory(store) => store.item_count().await,
            Backend::Sqlite(store) => {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoice_items")
                    .fetch_one(store.database().pool())
                    .await
                    .unwrap();
                count as usize
            }
        }
    }
}
