//! In-memory [`Store`] for tests and throwaway instances.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use database::models::{build_items, invoice_amount};
use database::{
    Client, ClientUpdate, Invoice, InvoiceDetail, InvoiceItem, InvoiceNumber, InvoiceStats,
    InvoiceStatus, InvoiceUpdate, InvoiceWithClient, NewClient, NewInvoice, NewUser, Session,
    User, UserUpdate,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};

/// Every table lives behind one lock so multi-row writes are atomic.
#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    sessions: HashMap<String, Session>,
    /// Insertion order doubles as creation order.
    clients: Vec<Client>,
    invoices: Vec<Invoice>,
    items: HashMap<String, Vec<InvoiceItem>>,
    counters: HashMap<String, u32>,
}

impl Tables {
    fn client(&self, id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    fn invoice_index(&self, id: &str) -> StoreResult<usize> {
        self.invoices
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| StoreError::not_found("Invoice", id))
    }

    fn next_number(&self, user_id: &str) -> StoreResult<InvoiceNumber> {
        match self.counters.get(user_id) {
            Some(last) => Ok(InvoiceNumber::new(*last).next()?),
            None => {
                let latest = self
                    .invoices
                    .iter()
                    .rev()
                    .find(|i| i.user_id == user_id)
                    .map(|i| i.invoice_number.as_str());
                Ok(InvoiceNumber::after(latest)?)
            }
        }
    }
}

/// In-memory persistence adapter.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored invoice items, across all invoices.
    pub async fn item_count(&self) -> usize {
        self.tables.read().await.items.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Users
    // =========================================================================

    async fn create_user(&self, new: &NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::AlreadyExists {
                entity: "User",
                id: new.email.clone(),
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            name: new.name.clone(),
            verification_token: new.verification_token.clone(),
            verification_expires_at: new.verification_expires_at,
            email_verified_at: None,
            profile_picture_url: None,
            company_logo_url: None,
            brand_theme: None,
            first_name: None,
            last_name: None,
            company: None,
            designation: None,
            department: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: &str, update: &UserUpdate) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("User", id))?;
        update.apply_to(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn verify_email_token(&self, token: &str, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let user = tables.users.values_mut().find(|u| {
            u.verification_token.as_deref() == Some(token)
                && u.verification_expires_at.map_or(true, |expires| expires > now)
        });

        Ok(user.map(|user| {
            user.verification_token = None;
            user.verification_expires_at = None;
            user.email_verified_at = Some(now);
            user.updated_at = now;
            user.clone()
        }))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(StoreError::Constraint(format!(
                "session for unknown user {}",
                session.user_id
            )));
        }
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(StoreError::AlreadyExists {
                entity: "Session",
                id: session.user_id.clone(),
            });
        }
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, token_hash: &str) -> StoreResult<Option<Session>> {
        Ok(self.tables.read().await.sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.tables.write().await.sessions.remove(token_hash).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| !session.is_expired(now));
        Ok((before - tables.sessions.len()) as u64)
    }

    // =========================================================================
    // Clients
    // =========================================================================

    async fn get_clients_by_user(&self, user_id: &str) -> StoreResult<Vec<Client>> {
        let tables = self.tables.read().await;
        Ok(tables
            .clients
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_client_by_id(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(self.tables.read().await.client(id).cloned())
    }

    async fn create_client(&self, new: &NewClient) -> StoreResult<Client> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&new.user_id) {
            return Err(StoreError::Constraint(format!(
                "client for unknown user {}",
                new.user_id
            )));
        }

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id.clone(),
            company_name: new.company_name.clone(),
            contact_name: new.contact_name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            address: new.address.clone(),
            website: new.website.clone(),
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.clients.push(client.clone());
        Ok(client)
    }

    async fn update_client(&self, id: &str, update: &ClientUpdate) -> StoreResult<Client> {
        let mut tables = self.tables.write().await;
        let client = tables
            .clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("Client", id))?;
        update.apply_to(client);
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn delete_client(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.invoices.iter().any(|i| i.client_id == id) {
            return Err(StoreError::Constraint(format!(
                "client {id} is referenced by invoices"
            )));
        }
        let before = tables.clients.len();
        tables.clients.retain(|c| c.id != id);
        if tables.clients.len() == before {
            return Err(StoreError::not_found("Client", id));
        }
        Ok(())
    }

    async fn count_client_invoices(&self, client_id: &str) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .iter()
            .filter(|i| i.client_id == client_id)
            .count() as i64)
    }

    // =========================================================================
    // Invoices
    // =========================================================================

    async fn get_invoices_by_user(&self, user_id: &str) -> StoreResult<Vec<InvoiceWithClient>> {
        let tables = self.tables.read().await;
        tables
            .invoices
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .map(|invoice| {
                let client = tables
                    .client(&invoice.client_id)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found("Client", invoice.client_id.clone()))?;
                Ok(InvoiceWithClient {
                    invoice: invoice.clone(),
                    client,
                })
            })
            .collect()
    }

    async fn get_invoice_by_id(&self, id: &str) -> StoreResult<Option<InvoiceDetail>> {
        let tables = self.tables.read().await;
        let Some(invoice) = tables.invoices.iter().find(|i| i.id == id) else {
            return Ok(None);
        };
        let client = tables
            .client(&invoice.client_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Client", invoice.client_id.clone()))?;

        Ok(Some(InvoiceDetail {
            invoice: invoice.clone(),
            client,
            items: tables.items.get(id).cloned().unwrap_or_default(),
        }))
    }

    async fn create_invoice(&self, new: &NewInvoice) -> StoreResult<Invoice> {
        let mut tables = self.tables.write().await;
        if tables.client(&new.client_id).is_none() {
            return Err(StoreError::Constraint(format!(
                "invoice for unknown client {}",
                new.client_id
            )));
        }

        // Nothing is written until every check has passed.
        let number = tables.next_number(&new.user_id)?;
        let invoice_number = number.to_string();
        if tables
            .invoices
            .iter()
            .any(|i| i.user_id == new.user_id && i.invoice_number == invoice_number)
        {
            return Err(StoreError::AlreadyExists {
                entity: "Invoice",
                id: invoice_number,
            });
        }

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id.clone(),
            client_id: new.client_id.clone(),
            invoice_number,
            status: InvoiceStatus::Draft,
            amount: invoice_amount(&new.items),
            due_date: new.due_date,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        tables.counters.insert(new.user_id.clone(), number.value());
        tables
            .items
            .insert(invoice.id.clone(), build_items(&invoice.id, &new.items));
        tables.invoices.push(invoice.clone());

        Ok(invoice)
    }

    async fn update_invoice(&self, id: &str, update: &InvoiceUpdate) -> StoreResult<Invoice> {
        let mut tables = self.tables.write().await;
        let index = tables.invoice_index(id)?;

        let actual = tables.invoices[index].status;
        if let Some(expected) = update.expected_status {
            if actual != expected {
                return Err(StoreError::StatusChanged { expected, actual });
            }
        }

        if let Some(items) = &update.items {
            tables.items.insert(id.to_string(), build_items(id, items));
        }

        let invoice = &mut tables.invoices[index];
        if let Some(status) = update.status {
            invoice.status = status;
        }
        if let Some(due_date) = update.due_date {
            invoice.due_date = due_date;
        }
        if let Some(notes) = &update.notes {
            invoice.notes = notes.clone();
        }
        if let Some(items) = &update.items {
            invoice.amount = invoice_amount(items);
        }
        invoice.updated_at = Utc::now();

        Ok(invoice.clone())
    }

    async fn delete_invoice(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let index = tables.invoice_index(id)?;
        tables.items.remove(id);
        tables.invoices.remove(index);
        Ok(())
    }

    async fn peek_next_invoice_number(&self, user_id: &str) -> StoreResult<InvoiceNumber> {
        self.tables.read().await.next_number(user_id)
    }

    async fn invoice_stats(&self, user_id: &str) -> StoreResult<InvoiceStats> {
        let tables = self.tables.read().await;
        Ok(InvoiceStats::from_invoices(
            tables.invoices.iter().filter(|i| i.user_id == user_id),
        ))
    }
}
