//! Database models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Overwrite `target` when the update carries the field; `Some(None)` clears it.
fn set_nullable(target: &mut Option<String>, value: &Option<Option<String>>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// UUID primary key.
    pub id: String,
    /// Login email, unique across users.
    pub email: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Display name.
    pub name: Option<String>,
    /// Pending email verification token, cleared once consumed.
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    /// When the pending verification token stops being accepted.
    #[serde(skip_serializing)]
    pub verification_expires_at: Option<DateTime<Utc>>,
    /// When the email address was verified.
    pub email_verified_at: Option<DateTime<Utc>>,
    pub profile_picture_url: Option<String>,
    /// Logo printed on invoices and emails.
    pub company_logo_url: Option<String>,
    /// Brand theme id (e.g. "modern-orange").
    pub brand_theme: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the email address has been verified.
    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Fields required to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

/// Partial profile update. `None` leaves a field untouched and
/// `Some(None)` (an explicit JSON `null`) clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_picture_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub company_logo_url: Option<Option<String>>,
    /// Clearing falls back to the default theme.
    #[serde(default, deserialize_with = "double_option")]
    pub brand_theme: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub designation: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub department: Option<Option<String>>,
}

impl UserUpdate {
    /// Apply the update to an in-memory user.
    pub fn apply_to(&self, user: &mut User) {
        set_nullable(&mut user.name, &self.name);
        set_nullable(&mut user.profile_picture_url, &self.profile_picture_url);
        set_nullable(&mut user.company_logo_url, &self.company_logo_url);
        set_nullable(&mut user.brand_theme, &self.brand_theme);
        set_nullable(&mut user.first_name, &self.first_name);
        set_nullable(&mut user.last_name, &self.last_name);
        set_nullable(&mut user.company, &self.company);
        set_nullable(&mut user.designation, &self.designation);
        set_nullable(&mut user.department, &self.department);
    }
}

/// A login session. Only the SHA-256 digest of the bearer token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A customer of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    /// Owning user.
    pub user_id: String,
    pub company_name: String,
    pub contact_name: Option<String>,
    /// Address invoices are sent to.
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Name used to greet the client: contact name, else company name.
    pub fn greeting_name(&self) -> &str {
        self.contact_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.company_name)
    }
}

/// Fields required to create a client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub user_id: String,
    pub company_name: String,
    pub contact_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Partial client update. `None` leaves a field untouched; the optional
/// contact fields are cleared by `Some(None)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_name: Option<Option<String>>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl ClientUpdate {
    /// Apply the update to an in-memory client.
    pub fn apply_to(&self, client: &mut Client) {
        if let Some(v) = &self.company_name {
            client.company_name = v.clone();
        }
        if let Some(v) = &self.email {
            client.email = v.clone();
        }
        set_nullable(&mut client.contact_name, &self.contact_name);
        set_nullable(&mut client.phone, &self.phone);
        set_nullable(&mut client.address, &self.address);
        set_nullable(&mut client.website, &self.website);
        set_nullable(&mut client.notes, &self.notes);
    }
}

/// Persisted invoice status.
///
/// `Overdue` is not a status: see [`DisplayStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Re-applying the current status is accepted as a no-op.
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Draft, Sent) | (Sent, Paid) | (Draft | Sent | Paid, Cancelled)
        )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PAID" => Ok(InvoiceStatus::Paid),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

/// Status label shown to users, including the derived overdue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
    Overdue,
}

/// An invoice header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    /// Owner of the client this invoice bills.
    pub user_id: String,
    pub client_id: String,
    /// `INV-NNNNN`, unique per user.
    pub invoice_number: String,
    pub status: InvoiceStatus,
    /// Sum of the item totals.
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Status as shown to users: a sent invoice past its due date is overdue.
    pub fn display_status(&self, today: NaiveDate) -> DisplayStatus {
        match self.status {
            InvoiceStatus::Sent if self.due_date.is_some_and(|due| due < today) => {
                DisplayStatus::Overdue
            }
            InvoiceStatus::Draft => DisplayStatus::Draft,
            InvoiceStatus::Sent => DisplayStatus::Sent,
            InvoiceStatus::Paid => DisplayStatus::Paid,
            InvoiceStatus::Cancelled => DisplayStatus::Cancelled,
        }
    }
}

impl<'r> FromRow<'r, SqliteRow> for Invoice {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            client_id: row.try_get("client_id")?,
            invoice_number: row.try_get("invoice_number")?,
            status: row.try_get("status")?,
            amount: decimal_column(row, "amount")?,
            due_date: row.try_get("due_date")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A line on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    /// Order of the line on the invoice.
    pub position: i64,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// `quantity * unit_price`, fixed at write time.
    pub total: Decimal,
}

impl<'r> FromRow<'r, SqliteRow> for InvoiceItem {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            invoice_id: row.try_get("invoice_id")?,
            position: row.try_get("position")?,
            description: row.try_get("description")?,
            quantity: decimal_column(row, "quantity")?,
            unit_price: decimal_column(row, "unit_price")?,
            total: decimal_column(row, "total")?,
        })
    }
}

/// A line to be written with a new or updated invoice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl NewInvoiceItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// Line total. Panics on overflow; check untrusted lines with
    /// [`NewInvoiceItem::checked_total`] first.
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// Line total, or `None` when it does not fit in a `Decimal`.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Invoice amount for a set of lines.
pub fn invoice_amount(items: &[NewInvoiceItem]) -> Decimal {
    items.iter().map(NewInvoiceItem::total).sum()
}

/// Invoice amount, or `None` when a line total or the sum overflows.
pub fn checked_invoice_amount(items: &[NewInvoiceItem]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |sum, item| {
        sum.checked_add(item.checked_total()?)
    })
}

/// Fields required to create an invoice. The number is allocated by the store.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub user_id: String,
    pub client_id: String,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

/// Partial invoice update.
///
/// When `items` is set the lines are replaced wholesale and the amount is
/// recomputed from the new lines.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub status: Option<InvoiceStatus>,
    /// When set, the update only applies if the stored status still
    /// matches; otherwise the store reports the status it found.
    pub expected_status: Option<InvoiceStatus>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
    pub items: Option<Vec<NewInvoiceItem>>,
}

impl InvoiceUpdate {
    /// Update that only changes the status.
    pub fn status(status: InvoiceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Status change that only applies while the invoice is still `from`.
    pub fn transition(from: InvoiceStatus, to: InvoiceStatus) -> Self {
        Self {
            status: Some(to),
            expected_status: Some(from),
            ..Self::default()
        }
    }
}

/// An invoice together with the client it bills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceWithClient {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Client,
}

/// An invoice with its client and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub client: Client,
    pub items: Vec<InvoiceItem>,
}

/// Dashboard figures for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStats {
    /// Sum of the amounts of paid invoices.
    pub total_revenue: Decimal,
    pub total_invoices: i64,
    pub paid_invoices: i64,
}

impl InvoiceStats {
    pub fn from_invoices<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> Self {
        invoices
            .into_iter()
            .fold(Self::default(), |mut stats, invoice| {
                stats.total_invoices += 1;
                if invoice.status == InvoiceStatus::Paid {
                    stats.paid_invoices += 1;
                    stats.total_revenue += invoice.amount;
                }
                stats
            })
    }
}

/// Build stored lines for an invoice from their input form.
pub fn build_items(invoice_id: &str, items: &[NewInvoiceItem]) -> Vec<InvoiceItem> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| InvoiceItem {
            id: uuid::Uuid::new_v4().to_string(),
            invoice_id: invoice_id.to_string(),
            position: position as i64,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total(),
        })
        .collect()
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
