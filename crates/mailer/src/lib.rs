//! # mailer
//!
//! SMTP client used by InvGen to deliver invoices and account emails.
//!
//! ```no_run
//! use mailer::{Attachment, Email, MailerConfig, SmtpMailer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mailer::MailerError> {
//!     let config = MailerConfig::from_env()?;
//!     let client = SmtpMailer::new(config)?;
//!
//!     let email = Email::new("billing@acme.com", "Invoice #INV-00001", "Please find attached.")
//!         .attach(Attachment::pdf("invoice-INV-00001.pdf", Vec::new()));
//!     client.send(&email).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::SmtpMailer;
pub use config::{MailerConfig, TlsMode};
pub use error::MailerError;
pub use types::{Attachment, Email};
