//! Invoice delivery: render, store, email, then mark SENT.
//!
//! The PDF is parked under a temporary key in the `invoice-attachments`
//! bucket so the email can link to it. That object is removed whatever the
//! outcome, including when the request future is dropped midway. The status
//! only moves to SENT once the mail provider has accepted the message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use database::{Invoice, InvoiceStatus, InvoiceUpdate, User};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::document::InvoiceDocument;
use crate::email::invoice_email;
use crate::error::{InvoicingError, Result, SendStep};
use crate::invoices::InvoiceService;
use crate::mail::MailDispatch;
use crate::pdf::render_invoice_pdf;
use crate::storage::{validate_key, Bucket, ObjectStore, SignedUpload};
use crate::store::{Store, StoreError};

const ATTACHMENTS: Bucket = Bucket::InvoiceAttachments;

/// Body of a send request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// Key of a PDF the caller uploaded through a signed upload URL. When
    /// absent the invoice is rendered server-side.
    pub pdf_path: Option<String>,
}

/// Result of a successful send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    pub invoice: Invoice,
    /// Link that was emailed. The object behind it has already been removed.
    pub pdf_url: String,
}

/// Temporary key for an invoice PDF.
pub fn attachment_key(user_id: &str, invoice_number: &str, now: DateTime<Utc>) -> String {
    format!(
        "{user_id}/invoice-{invoice_number}-{}.pdf",
        now.timestamp_millis()
    )
}

/// Removes a temporary object when dropped.
///
/// [`TempObject::remove`] is the normal path. If the owning future is
/// cancelled first, `Drop` spawns the removal on the current runtime.
struct TempObject {
    objects: Arc<dyn ObjectStore>,
    bucket: Bucket,
    key: String,
    armed: bool,
}

impl TempObject {
    fn new(objects: Arc<dyn ObjectStore>, bucket: Bucket, key: String) -> Self {
        Self {
            objects,
            bucket,
            key,
            armed: true,
        }
    }

    async fn remove(mut self) {
        self.armed = false;
        if let Err(e) = self.objects.remove(self.bucket, &self.key).await {
            warn!(bucket = %self.bucket, key = %self.key, error = %e, "Failed to remove temporary object");
        }
    }
}

impl Drop for TempObject {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No runtime to remove temporary object");
            return;
        };

        let objects = Arc::clone(&self.objects);
        let bucket = self.bucket;
        let key = std::mem::take(&mut self.key);
        handle.spawn(async move {
            if let Err(e) = objects.remove(bucket, &key).await {
                warn!(%bucket, %key, error = %e, "Failed to remove temporary object");
            }
        });
    }
}

#[derive(Clone)]
pub struct SendWorkflow {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    mail: Arc<dyn MailDispatch>,
    invoices: InvoiceService,
}

impl SendWorkflow {
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        mail: Arc<dyn MailDispatch>,
    ) -> Self {
        Self {
            invoices: InvoiceService::new(Arc::clone(&store)),
            store,
            objects,
            mail,
        }
    }

    /// Signed URL the caller can upload its own rendering of an invoice to.
    /// The returned `path` is accepted as [`SendRequest::pdf_path`].
    pub async fn upload_url(&self, user: &User, invoice_id: &str) -> Result<SignedUpload> {
        let detail = self.invoices.get(&user.id, invoice_id).await?;
        let key = attachment_key(&user.id, &detail.invoice.invoice_number, Utc::now());
        Ok(self.objects.create_signed_upload_url(ATTACHMENTS, &key)?)
    }

    /// Email an invoice to its client and mark it SENT.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn send(&self, user: &User, invoice_id: &str, request: SendRequest) -> Result<SendReceipt> {
        let detail = self.invoices.get(&user.id, invoice_id).await?;
        let invoice = &detail.invoice;

        if matches!(invoice.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            return Err(InvoicingError::InvalidTransition {
                from: invoice.status,
                to: InvoiceStatus::Sent,
            });
        }
        if detail.client.email.trim().is_empty() {
            return Err(InvoicingError::validation("client email is required"));
        }

        let document = InvoiceDocument::new(&detail, user, Utc::now().date_naive());
        let provided = match request.pdf_path.as_deref() {
            Some(path) => Some(self.uploaded_key(user, path)?),
            None => None,
        };

        let key = provided
            .clone()
            .unwrap_or_else(|| attachment_key(&user.id, &invoice.invoice_number, Utc::now()));
        let temp = TempObject::new(Arc::clone(&self.objects), ATTACHMENTS, key.clone());

        let delivered = self
            .deliver(&document, detail.client.greeting_name(), &key, provided.is_some())
            .await;
        temp.remove().await;
        let pdf_url = delivered?;

        let invoice = if invoice.status == InvoiceStatus::Draft {
            let update = InvoiceUpdate::transition(InvoiceStatus::Draft, InvoiceStatus::Sent);
            match self.store.update_invoice(&invoice.id, &update).await {
                Ok(updated) => updated,
                Err(StoreError::StatusChanged {
                    actual: InvoiceStatus::Sent,
                    ..
                }) => self.invoices.get(&user.id, &invoice.id).await?.invoice,
                Err(StoreError::StatusChanged { actual, .. }) => {
                    warn!(
                        invoice_id = %invoice.id,
                        status = %actual,
                        "Invoice changed status while it was being sent"
                    );
                    return Err(InvoicingError::InvalidTransition {
                        from: actual,
                        to: InvoiceStatus::Sent,
                    });
                }
                Err(e) => return Err(InvoicingError::send(SendStep::Persistence, e)),
            }
        } else {
            invoice.clone()
        };

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            to = %detail.client.email,
            "Invoice sent"
        );
        Ok(SendReceipt { invoice, pdf_url })
    }

    /// Obtain the PDF, publish it under `key` and email it. Returns the
    /// public URL that was sent.
    async fn deliver(
        &self,
        document: &InvoiceDocument,
        greeting: &str,
        key: &str,
        uploaded: bool,
    ) -> Result<String> {
        let pdf = if uploaded {
            self.objects
                .download(ATTACHMENTS, key)
                .await
                .map_err(|e| InvoicingError::send(SendStep::Storage, e))?
        } else {
            let pdf = render_invoice_pdf(document)
                .map_err(|e| InvoicingError::send(SendStep::Render, e))?;
            self.objects
                .upload(ATTACHMENTS, key, &pdf, "application/pdf")
                .await
                .map_err(|e| InvoicingError::send(SendStep::Storage, e))?;
            pdf
        };

        let pdf_url = self.objects.public_url(ATTACHMENTS, key);
        let email = invoice_email(document, greeting, &pdf_url, pdf)
            .map_err(|e| InvoicingError::send(SendStep::Mail, e))?;
        self.mail
            .send(&email)
            .await
            .map_err(|e| InvoicingError::send(SendStep::Mail, e))?;

        Ok(pdf_url)
    }

    /// Check that `path` names one of the caller's invoice attachments.
    fn uploaded_key(&self, user: &User, path: &str) -> Result<String> {
        let key = path
            .trim()
            .trim_start_matches('/')
            .trim_start_matches("invoice-attachments/");
        validate_key(key).map_err(|_| InvoicingError::validation("invalid pdfPath"))?;
        if !key.starts_with(&format!("{}/", user.id)) {
            return Err(InvoicingError::validation(
                "pdfPath must point to one of your invoice attachments",
            ));
        }
        Ok(key.to_string())
    }
}
