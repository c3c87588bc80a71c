//! Application state shared across handlers.

use std::sync::Arc;

use invoicing::mail::MailDispatch;
use invoicing::storage::ObjectStore;
use invoicing::store::Store;
use invoicing::{AccountService, AccountSettings, ClientService, InvoiceService, SendWorkflow};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub clients: ClientService,
    pub invoices: InvoiceService,
    pub send: SendWorkflow,
    /// Object storage, served directly by the storage routes.
    pub objects: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Wire the services to their adapters.
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        mail: Arc<dyn MailDispatch>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            accounts: AccountService::new(
                Arc::clone(&store),
                Arc::clone(&objects),
                Arc::clone(&mail),
                settings,
            ),
            clients: ClientService::new(Arc::clone(&store)),
            invoices: InvoiceService::new(Arc::clone(&store)),
            send: SendWorkflow::new(store, Arc::clone(&objects), mail),
            objects,
        }
    }
}
