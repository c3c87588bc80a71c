//! InvGen domain core.
//!
//! Services in this crate hold the business rules of the invoicing app and
//! talk to the outside world only through three seams:
//!
//! - [`Store`](store::Store) for persistence (SQLite or in memory)
//! - [`ObjectStore`](storage::ObjectStore) for PDFs, avatars and logos
//! - [`MailDispatch`](mail::MailDispatch) for outgoing email
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use invoicing::mail::LoggingDispatch;
//! use invoicing::storage::{MemoryObjectStore, UrlSigner};
//! use invoicing::store::MemoryStore;
//! use invoicing::{InvoiceService, SendWorkflow};
//!
//! let store = Arc::new(MemoryStore::new());
//! let signer = UrlSigner::new("http://127.0.0.1:3000", "secret", chrono::Duration::hours(2));
//! let objects = Arc::new(MemoryObjectStore::new(signer));
//!
//! let invoices = InvoiceService::new(store.clone());
//! let send = SendWorkflow::new(store, objects, Arc::new(LoggingDispatch));
//! ```

pub mod accounts;
pub mod branding;
pub mod clients;
pub mod document;
pub mod email;
pub mod error;
pub mod invoices;
pub mod mail;
pub mod pdf;
pub mod send;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use accounts::{AccountService, AccountSettings};
pub use clients::ClientService;
pub use error::{InvoicingError, Result, SendStep};
pub use invoices::InvoiceService;
pub use send::{SendReceipt, SendRequest, SendWorkflow};
