//! Invoice lifecycle: creation, partial updates, status transitions and deletion.
//!
//! Every operation takes the caller's user id. Invoices that belong to
//! someone else are reported as not found.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use database::models::{checked_invoice_amount, double_option};
use database::validation::{validate_optional, validate_required, MAX_NOTES_LENGTH};
use database::{
    Client, DisplayStatus, Invoice, InvoiceDetail, InvoiceStats, InvoiceStatus, InvoiceUpdate,
    NewInvoice, NewInvoiceItem, User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::InvoiceDocument;
use crate::error::{InvoicingError, Result};
use crate::pdf::render_invoice_pdf;
use crate::store::{Store, StoreError};

const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// One line of a create or update request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItemRequest {
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
}

impl InvoiceItemRequest {
    pub fn new(description: &str, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: Some(description.to_string()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
        }
    }
}

/// Body of an invoice create request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub client_id: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub due_date: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItemRequest>,
}

/// Body of an invoice update request. Absent fields are left untouched;
/// `null` clears `dueDate` and `notes`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    pub items: Option<Vec<InvoiceItemRequest>>,
}

impl UpdateInvoiceRequest {
    pub fn status(status: InvoiceStatus) -> Self {
        Self {
            status: Some(status.to_string()),
            ..Self::default()
        }
    }
}

/// An invoice row as listed, with its client and display status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Client,
    pub display_status: DisplayStatus,
}

/// A full invoice with its display status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceView {
    #[serde(flatten)]
    pub detail: InvoiceDetail,
    pub display_status: DisplayStatus,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_due_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .map(Some)
        .ok_or_else(|| InvoicingError::validation(format!("invalid due date: {raw}")))
}

fn parse_items(items: &[InvoiceItemRequest]) -> Result<Vec<NewInvoiceItem>> {
    if items.is_empty() {
        return Err(InvoicingError::validation("at least one item is required"));
    }

    let items = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let line = index + 1;
            let description =
                validate_required("description", item.description.as_deref(), MAX_DESCRIPTION_LENGTH)
                    .map_err(|e| InvoicingError::validation(format!("item {line}: {e}")))?;
            let quantity = item
                .quantity
                .filter(|q| *q > Decimal::ZERO)
                .ok_or_else(|| {
                    InvoicingError::validation(format!("item {line}: quantity must be greater than 0"))
                })?;
            let unit_price = item
                .unit_price
                .filter(|p| *p >= Decimal::ZERO)
                .ok_or_else(|| {
                    InvoicingError::validation(format!("item {line}: unit price must be 0 or more"))
                })?;
            let item = NewInvoiceItem::new(description, quantity, unit_price);
            if item.checked_total().is_none() {
                return Err(InvoicingError::validation(format!("item {line}: total is too large")));
            }
            Ok(item)
        })
        .collect::<Result<Vec<_>>>()?;

    if checked_invoice_amount(&items).is_none() {
        return Err(InvoicingError::validation("invoice amount is too large"));
    }
    Ok(items)
}

fn parse_status(raw: &str) -> Result<InvoiceStatus> {
    raw.trim()
        .parse::<InvoiceStatus>()
        .map_err(InvoicingError::Validation)
}

#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn Store>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The caller's invoices, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<InvoiceSummary>> {
        let today = today();
        let invoices = self.store.get_invoices_by_user(user_id).await?;
        Ok(invoices
            .into_iter()
            .map(|row| InvoiceSummary {
                display_status: row.invoice.display_status(today),
                invoice: row.invoice,
                client: row.client,
            })
            .collect())
    }

    /// Load an invoice owned by the caller.
    pub async fn get(&self, user_id: &str, invoice_id: &str) -> Result<InvoiceDetail> {
        match self.store.get_invoice_by_id(invoice_id).await? {
            Some(detail) if detail.client.user_id == user_id => Ok(detail),
            _ => Err(InvoicingError::not_found("Invoice")),
        }
    }

    pub async fn view(&self, user_id: &str, invoice_id: &str) -> Result<InvoiceView> {
        let detail = self.get(user_id, invoice_id).await?;
        Ok(InvoiceView {
            display_status: detail.invoice.display_status(today()),
            detail,
        })
    }

    /// Create a DRAFT invoice with a freshly allocated number.
    pub async fn create(&self, user_id: &str, request: CreateInvoiceRequest) -> Result<Invoice> {
        let client_id = request
            .client_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| InvoicingError::validation("clientId is required"))?;
        let items = parse_items(&request.items)?;
        let due_date = parse_due_date(request.due_date.as_deref())?;
        let notes = validate_optional("notes", request.notes.as_deref(), MAX_NOTES_LENGTH)?;

        match self.store.get_client_by_id(client_id).await? {
            Some(client) if client.user_id == user_id => {}
            _ => return Err(InvoicingError::not_found("Client")),
        }

        let invoice = self
            .store
            .create_invoice(&NewInvoice {
                user_id: user_id.to_string(),
                client_id: client_id.to_string(),
                due_date,
                notes,
                items,
            })
            .await?;

        info!(
            user_id,
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            amount = %invoice.amount,
            "Created invoice"
        );
        Ok(invoice)
    }

    /// Apply a status change and/or field edits.
    ///
    /// Replacing the items always recomputes the amount.
    pub async fn update(
        &self,
        user_id: &str,
        invoice_id: &str,
        request: UpdateInvoiceRequest,
    ) -> Result<Invoice> {
        let current = self.get(user_id, invoice_id).await?.invoice;

        let status = match request.status.as_deref() {
            Some(raw) => {
                let next = parse_status(raw)?;
                if !current.status.can_transition_to(next) {
                    return Err(InvoicingError::InvalidTransition {
                        from: current.status,
                        to: next,
                    });
                }
                (next != current.status).then_some(next)
            }
            None => None,
        };
        let due_date = match request.due_date {
            Some(raw) => Some(parse_due_date(raw.as_deref())?),
            None => None,
        };
        let notes = match request.notes {
            Some(raw) => Some(validate_optional("notes", raw.as_deref(), MAX_NOTES_LENGTH)?),
            None => None,
        };
        let items = match request.items {
            Some(items) => Some(parse_items(&items)?),
            None => None,
        };

        let update = InvoiceUpdate {
            status,
            // The transition was checked against `current`; only write it if
            // nobody moved the invoice in the meantime.
            expected_status: status.map(|_| current.status),
            due_date,
            notes,
            items,
        };
        if update.status.is_none()
            && update.due_date.is_none()
            && update.notes.is_none()
            && update.items.is_none()
        {
            return Ok(current);
        }

        let invoice = self
            .store
            .update_invoice(invoice_id, &update)
            .await
            .map_err(|err| match (err, status) {
                (StoreError::StatusChanged { actual, .. }, Some(next)) => {
                    InvoicingError::InvalidTransition {
                        from: actual,
                        to: next,
                    }
                }
                (err, _) => err.into(),
            })?;
        info!(
            user_id,
            invoice_id,
            from = %current.status,
            to = %invoice.status,
            "Updated invoice"
        );
        Ok(invoice)
    }

    /// Delete an invoice and its items.
    pub async fn delete(&self, user_id: &str, invoice_id: &str) -> Result<()> {
        self.get(user_id, invoice_id).await?;
        self.store.delete_invoice(invoice_id).await?;
        info!(user_id, invoice_id, "Deleted invoice");
        Ok(())
    }

    /// The number the caller's next invoice will get.
    pub async fn next_number(&self, user_id: &str) -> Result<String> {
        Ok(self.store.peek_next_invoice_number(user_id).await?.to_string())
    }

    pub async fn stats(&self, user_id: &str) -> Result<InvoiceStats> {
        Ok(self.store.invoice_stats(user_id).await?)
    }

    /// Presentation model of an invoice, branded for its owner.
    pub async fn document(&self, user: &User, invoice_id: &str) -> Result<InvoiceDocument> {
        let detail = self.get(&user.id, invoice_id).await?;
        Ok(InvoiceDocument::new(&detail, user, today()))
    }

    /// Render an invoice to PDF. Returns the invoice number and the bytes.
    pub async fn render_pdf(&self, user: &User, invoice_id: &str) -> Result<(String, Vec<u8>)> {
        let document = self.document(user, invoice_id).await?;
        let pdf = render_invoice_pdf(&document)?;
        Ok((document.invoice_number, pdf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientService;
    use crate::test_support::{acme, seed_user, TestStore};
    use rust_decimal_macros::dec;

    struct Harness {
        backend: TestStore,
        store: Arc<dyn Store>,
        invoices: InvoiceService,
        user: User,
        client: Client,
    }

    async fn harness(backend: TestStore) -> Harness {
        let store = backend.store();
        let user = seed_user(store.as_ref(), "alice@example.com").await;
        let client = ClientService::new(Arc::clone(&store))
            .create(&user.id, acme())
            .await
            .unwrap();
        Harness {
            invoices: InvoiceService::new(Arc::clone(&store)),
            backend,
            store,
            user,
            client,
        }
    }

    /// A harness per store adapter.
    async fn harnesses() -> Vec<Harness> {
        let mut all = Vec::new();
        for backend in TestStore::all().await {
            all.push(harness(backend).await);
        }
        all
    }

    fn create_request(client_id: &str, items: Vec<InvoiceItemRequest>) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            client_id: Some(client_id.to_string()),
            due_date: Some("2030-01-31".to_string()),
            notes: Some("Net 30".to_string()),
            items,
        }
    }

    #[tokio::test]
    async fn test_acme_scenario() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(2), dec!(100))]),
                )
                .await
                .unwrap();
            assert_eq!(invoice.invoice_number, "INV-00001", "{}", h.backend.name());
            assert_eq!(invoice.status, InvoiceStatus::Draft);
            assert_eq!(invoice.amount, dec!(200));
            assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2030, 1, 31));

            let detail = h.invoices.get(&h.user.id, &invoice.id).await.unwrap();
            assert_eq!(detail.items.len(), 1);
            assert_eq!(detail.items[0].total, dec!(200));

            assert_eq!(h.invoices.next_number(&h.user.id).await.unwrap(), "INV-00002");
        }
    }

    #[tokio::test]
    async fn test_amount_sums_item_totals() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(
                        &h.client.id,
                        vec![
                            InvoiceItemRequest::new("Design", dec!(2), dec!(100)),
                            InvoiceItemRequest::new("Hosting", dec!(1.5), dec!(20)),
                            InvoiceItemRequest::new("Goodwill", dec!(1), dec!(0)),
                        ],
                    ),
                )
                .await
                .unwrap();
            assert_eq!(invoice.amount, dec!(230));
        }
    }

    #[tokio::test]
    async fn test_invalid_create_persists_nothing() {
        for h in harnesses().await {
            let cases = vec![
                create_request(&h.client.id, vec![]),
                create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(0), dec!(100))]),
                create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(-1))]),
                create_request(&h.client.id, vec![InvoiceItemRequest::new("  ", dec!(1), dec!(1))]),
                CreateInvoiceRequest {
                    client_id: None,
                    items: vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))],
                    ..CreateInvoiceRequest::default()
                },
                CreateInvoiceRequest {
                    due_date: Some("31/01/2030".to_string()),
                    ..create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))])
                },
            ];
            for request in cases {
                let err = h.invoices.create(&h.user.id, request).await.unwrap_err();
                assert!(matches!(err, InvoicingError::Validation(_)), "{}: {err}", h.backend.name());
            }

            assert!(h.invoices.list(&h.user.id).await.unwrap().is_empty());
            assert_eq!(h.backend.item_count().await, 0);
            assert_eq!(h.invoices.next_number(&h.user.id).await.unwrap(), "INV-00001");
        }
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected() {
        for h in harnesses().await {
            let big = dec!(100000000000000000000);
            let line_overflow = create_request(&h.client.id, vec![InvoiceItemRequest::new("Huge", big, big)]);
            let err = h.invoices.create(&h.user.id, line_overflow).await.unwrap_err();
            assert!(err.to_string().contains("item 1: total is too large"), "{err}");

            let half = Decimal::MAX / dec!(2);
            let sum_overflow = create_request(
                &h.client.id,
                vec![
                    InvoiceItemRequest::new("First", dec!(1), half),
                    InvoiceItemRequest::new("Second", dec!(1), half),
                    InvoiceItemRequest::new("Third", dec!(1), half),
                ],
            );
            let err = h.invoices.create(&h.user.id, sum_overflow).await.unwrap_err();
            assert!(matches!(err, InvoicingError::Validation(_)), "{err}");

            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))]),
                )
                .await
                .unwrap();
            let err = h
                .invoices
                .update(
                    &h.user.id,
                    &invoice.id,
                    UpdateInvoiceRequest {
                        items: Some(vec![InvoiceItemRequest::new("Huge", big, big)]),
                        ..UpdateInvoiceRequest::default()
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, InvoicingError::Validation(_)), "{err}");

            assert_eq!(h.invoices.list(&h.user.id).await.unwrap().len(), 1);
            assert_eq!(h.backend.item_count().await, 1);
        }
    }

    #[tokio::test]
    async fn test_stale_status_write_is_refused() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))]),
                )
                .await
                .unwrap();
            h.invoices
                .update(&h.user.id, &invoice.id, UpdateInvoiceRequest::status(InvoiceStatus::Cancelled))
                .await
                .unwrap();

            // A writer that still believes the invoice is a draft.
            let stale = InvoiceUpdate::transition(InvoiceStatus::Draft, InvoiceStatus::Sent);
            assert!(matches!(
                h.store.update_invoice(&invoice.id, &stale).await,
                Err(StoreError::StatusChanged {
                    expected: InvoiceStatus::Draft,
                    actual: InvoiceStatus::Cancelled,
                })
            ));
            assert_eq!(
                h.invoices.get(&h.user.id, &invoice.id).await.unwrap().invoice.status,
                InvoiceStatus::Cancelled,
                "{}",
                h.backend.name()
            );
        }
    }

    #[tokio::test]
    async fn test_create_for_foreign_client_is_not_found() {
        for h in harnesses().await {
            let bob = seed_user(h.store.as_ref(), "bob@example.com").await;

            let err = h
                .invoices
                .create(
                    &bob.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))]),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, InvoicingError::NotFound { entity: "Client" }));
        }
    }

    #[tokio::test]
    async fn test_foreign_invoice_is_not_found() {
        for h in harnesses().await {
            let bob = seed_user(h.store.as_ref(), "bob@example.com").await;
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))]),
                )
                .await
                .unwrap();

            assert!(matches!(
                h.invoices.get(&bob.id, &invoice.id).await,
                Err(InvoicingError::NotFound { entity: "Invoice" })
            ));
            assert!(matches!(
                h.invoices
                    .update(&bob.id, &invoice.id, UpdateInvoiceRequest::status(InvoiceStatus::Cancelled))
                    .await,
                Err(InvoicingError::NotFound { .. })
            ));
            assert!(matches!(
                h.invoices.delete(&bob.id, &invoice.id).await,
                Err(InvoicingError::NotFound { .. })
            ));
            assert_eq!(
                h.invoices.get(&h.user.id, &invoice.id).await.unwrap().invoice.status,
                InvoiceStatus::Draft
            );
        }
    }

    #[tokio::test]
    async fn test_status_transitions() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(1), dec!(1))]),
                )
                .await
                .unwrap();
            let set = |status| UpdateInvoiceRequest::status(status);

            let err = h
                .invoices
                .update(&h.user.id, &invoice.id, set(InvoiceStatus::Paid))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                InvoicingError::InvalidTransition {
                    from: InvoiceStatus::Draft,
                    to: InvoiceStatus::Paid
                }
            ));

            let sent = h.invoices.update(&h.user.id, &invoice.id, set(InvoiceStatus::Sent)).await.unwrap();
            assert_eq!(sent.status, InvoiceStatus::Sent);

            // Same status again is a no-op.
            let again = h.invoices.update(&h.user.id, &invoice.id, set(InvoiceStatus::Sent)).await.unwrap();
            assert_eq!(again.status, InvoiceStatus::Sent);

            let paid = h.invoices.update(&h.user.id, &invoice.id, set(InvoiceStatus::Paid)).await.unwrap();
            assert_eq!(paid.status, InvoiceStatus::Paid);

            let cancelled = h
                .invoices
                .update(&h.user.id, &invoice.id, set(InvoiceStatus::Cancelled))
                .await
                .unwrap();
            assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

            assert!(matches!(
                h.invoices.update(&h.user.id, &invoice.id, set(InvoiceStatus::Draft)).await,
                Err(InvoicingError::InvalidTransition { .. })
            ));

            let overdue = UpdateInvoiceRequest {
                status: Some("OVERDUE".to_string()),
                ..UpdateInvoiceRequest::default()
            };
            assert!(matches!(
                h.invoices.update(&h.user.id, &invoice.id, overdue).await,
                Err(InvoicingError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_update_replaces_items_and_recomputes_amount() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(2), dec!(100))]),
                )
                .await
                .unwrap();

            let updated = h
                .invoices
                .update(
                    &h.user.id,
                    &invoice.id,
                    UpdateInvoiceRequest {
                        due_date: Some(None),
                        items: Some(vec![
                            InvoiceItemRequest::new("Review", dec!(1), dec!(25.50)),
                            InvoiceItemRequest::new("Call", dec!(0.5), dec!(20)),
                        ]),
                        ..UpdateInvoiceRequest::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(updated.amount, dec!(35.50));
            assert_eq!(updated.due_date, None);
            assert_eq!(updated.notes.as_deref(), Some("Net 30"));

            let detail = h.invoices.get(&h.user.id, &invoice.id).await.unwrap();
            assert_eq!(detail.items.len(), 2);
            assert_eq!(detail.items[0].description, "Review");
            assert_eq!(h.backend.item_count().await, 2);
        }
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let request: UpdateInvoiceRequest =
            serde_json::from_str(r#"{"dueDate": null, "status": "PAID"}"#).unwrap();
        assert_eq!(request.due_date, Some(None));
        assert_eq!(request.notes, None);
        assert_eq!(request.status.as_deref(), Some("PAID"));
    }

    #[test]
    fn test_create_request_accepts_json_numbers() {
        let request: CreateInvoiceRequest = serde_json::from_str(
            r#"{"clientId": "c1", "dueDate": "2030-01-31T00:00:00.000Z",
                "items": [{"description": "Design", "quantity": 2, "unitPrice": 100.5}]}"#,
        )
        .unwrap();
        let items = parse_items(&request.items).unwrap();
        assert_eq!(items[0].total(), dec!(201));
        assert_eq!(
            parse_due_date(request.due_date.as_deref()).unwrap(),
            NaiveDate::from_ymd_opt(2030, 1, 31)
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_items() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(
                        &h.client.id,
                        vec![
                            InvoiceItemRequest::new("Design", dec!(1), dec!(1)),
                            InvoiceItemRequest::new("Build", dec!(1), dec!(1)),
                        ],
                    ),
                )
                .await
                .unwrap();
            assert_eq!(h.backend.item_count().await, 2);

            h.invoices.delete(&h.user.id, &invoice.id).await.unwrap();
            assert_eq!(h.backend.item_count().await, 0);
            assert!(matches!(
                h.invoices.get(&h.user.id, &invoice.id).await,
                Err(InvoicingError::NotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        for h in harnesses().await {
            let items = || vec![InvoiceItemRequest::new("Design", dec!(2), dec!(100))];

            let first = h.invoices.create(&h.user.id, create_request(&h.client.id, items())).await.unwrap();
            let overdue = CreateInvoiceRequest {
                due_date: Some("2020-01-01".to_string()),
                ..create_request(&h.client.id, items())
            };
            let second = h.invoices.create(&h.user.id, overdue).await.unwrap();

            for status in [InvoiceStatus::Sent, InvoiceStatus::Paid] {
                h.invoices
                    .update(&h.user.id, &first.id, UpdateInvoiceRequest::status(status))
                    .await
                    .unwrap();
            }
            h.invoices
                .update(&h.user.id, &second.id, UpdateInvoiceRequest::status(InvoiceStatus::Sent))
                .await
                .unwrap();

            let listed = h.invoices.list(&h.user.id).await.unwrap();
            assert_eq!(listed.len(), 2);
            assert_eq!(listed[0].invoice.id, second.id);
            assert_eq!(listed[0].display_status, DisplayStatus::Overdue);
            assert_eq!(listed[0].invoice.status, InvoiceStatus::Sent);
            assert_eq!(listed[1].display_status, DisplayStatus::Paid);

            let stats = h.invoices.stats(&h.user.id).await.unwrap();
            assert_eq!(stats.total_invoices, 2);
            assert_eq!(stats.paid_invoices, 1);
            assert_eq!(stats.total_revenue, dec!(200));
        }
    }

    #[tokio::test]
    async fn test_render_pdf() {
        for h in harnesses().await {
            let invoice = h
                .invoices
                .create(
                    &h.user.id,
                    create_request(&h.client.id, vec![InvoiceItemRequest::new("Design", dec!(2), dec!(100))]),
                )
                .await
                .unwrap();

            let (number, pdf) = h.invoices.render_pdf(&h.user, &invoice.id).await.unwrap();
            assert_eq!(number, "INV-00001");
            assert!(pdf.starts_with(b"%PDF-"));
        }
    }
}
