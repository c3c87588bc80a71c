//! Mail dispatch trait and implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mailer::{Email, MailerError, SmtpMailer};
use tokio::sync::Mutex;

/// Trait for delivering outgoing email.
///
/// Abstracted so the workflows can run against SMTP, a log, or a test double.
#[async_trait]
pub trait MailDispatch: Send + Sync {
    /// Deliver an email. Returns once the provider has accepted it.
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

#[async_trait]
impl MailDispatch for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        SmtpMailer::send(self, email).await
    }
}

/// A mail dispatcher that only logs what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct LoggingDispatch;

#[async_trait]
impl MailDispatch for LoggingDispatch {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        tracing::info!(
            to = ?email.to,
            subject = %email.subject,
            attachments = email.attachments.len(),
            "Email not sent (log backend)"
        );
        tracing::debug!(body = %email.body, "Email body");
        Ok(())
    }
}

/// A mail dispatcher for tests that records every email and can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatch {
    sent: Arc<Mutex<Vec<Email>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail with a provider error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Emails accepted so far.
    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailDispatch for RecordingDispatch {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Delivery("535 authentication failed".to_string()));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
