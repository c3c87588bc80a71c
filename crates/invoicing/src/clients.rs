//! Client management scoped to the calling user.

use std::sync::Arc;

use database::validation::{
    validate_email, validate_nullable, validate_optional, validate_required, MAX_NOTES_LENGTH,
    MAX_TEXT_LENGTH,
};
use database::{Client, ClientUpdate, NewClient};
use serde::Deserialize;
use tracing::info;

use crate::error::{InvoicingError, Result};
use crate::store::Store;

/// Body of a client create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequest {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn Store>,
}

impl ClientService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Client>> {
        Ok(self.store.get_clients_by_user(user_id).await?)
    }

    /// Fetch a client owned by `user_id`.
    pub async fn get(&self, user_id: &str, client_id: &str) -> Result<Client> {
        match self.store.get_client_by_id(client_id).await? {
            Some(client) if client.user_id == user_id => Ok(client),
            _ => Err(InvoicingError::not_found("Client")),
        }
    }

    pub async fn create(&self, user_id: &str, request: ClientRequest) -> Result<Client> {
        let company_name =
            validate_required("companyName", request.company_name.as_deref(), MAX_TEXT_LENGTH)?;
        let email = request.email.as_deref().map(str::trim).unwrap_or_default();
        validate_email(email)?;

        let client = self
            .store
            .create_client(&NewClient {
                user_id: user_id.to_string(),
                company_name: company_name.to_string(),
                contact_name: validate_optional("contactName", request.contact_name.as_deref(), MAX_TEXT_LENGTH)?,
                email: email.to_string(),
                phone: validate_optional("phone", request.phone.as_deref(), MAX_TEXT_LENGTH)?,
                address: validate_optional("address", request.address.as_deref(), MAX_NOTES_LENGTH)?,
                website: validate_optional("website", request.website.as_deref(), MAX_TEXT_LENGTH)?,
                notes: validate_optional("notes", request.notes.as_deref(), MAX_NOTES_LENGTH)?,
            })
            .await?;

        info!(user_id, client_id = %client.id, "Created client");
        Ok(client)
    }

    /// Apply a partial update. Required fields cannot be blanked.
    pub async fn update(&self, user_id: &str, client_id: &str, update: ClientUpdate) -> Result<Client> {
        self.get(user_id, client_id).await?;

        let mut update = update;
        if let Some(name) = update.company_name.as_deref() {
            update.company_name =
                Some(validate_required("companyName", Some(name), MAX_TEXT_LENGTH)?.to_string());
        }
        if let Some(email) = update.email.as_deref() {
            let email = email.trim();
            validate_email(email)?;
            update.email = Some(email.to_string());
        }
        update.contact_name =
            validate_nullable("contactName", update.contact_name.take(), MAX_TEXT_LENGTH)?;
        update.phone = validate_nullable("phone", update.phone.take(), MAX_TEXT_LENGTH)?;
        update.address = validate_nullable("address", update.address.take(), MAX_NOTES_LENGTH)?;
        update.website = validate_nullable("website", update.website.take(), MAX_TEXT_LENGTH)?;
        update.notes = validate_nullable("notes", update.notes.take(), MAX_NOTES_LENGTH)?;

        Ok(self.store.update_client(client_id, &update).await?)
    }

    /// Delete a client that has no invoices.
    pub async fn delete(&self, user_id: &str, client_id: &str) -> Result<()> {
        self.get(user_id, client_id).await?;

        let invoices = self.store.count_client_invoices(client_id).await?;
        if invoices > 0 {
            return Err(InvoicingError::Conflict(format!(
                "Cannot delete client with {invoices} existing invoice(s). Delete the invoices first."
            )));
        }

        self.store.delete_client(client_id).await?;
        info!(user_id, client_id, "Deleted client");
        Ok(())
    }
}
