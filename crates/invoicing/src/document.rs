//! Presentation model of an invoice shared by the PDF, HTML preview and emails.

use chrono::NaiveDate;
use database::{DisplayStatus, InvoiceDetail, User};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::branding::Branding;

/// Tax applied on top of the subtotal.
pub const TAX_RATE_PERCENT: Decimal = Decimal::ZERO;

/// Render an amount as dollars with two decimals, e.g. `$1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = round_cents(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let fixed = format!("{:.2}", rounded.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}${grouped}.{cents}")
}

/// Round half away from zero to whole cents.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Render a quantity without trailing zeros (`2`, `1.5`).
pub fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// Who the invoice is from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuer {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
}

impl Issuer {
    pub fn from_user(user: &User) -> Self {
        let full_name = match (&user.first_name, &user.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        };
        Self {
            name: full_name
                .or_else(|| user.name.clone())
                .unwrap_or_else(|| user.email.clone()),
            email: user.email.clone(),
            company: user.company.clone(),
        }
    }
}

/// One formatted invoice line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: String,
    pub unit_price: String,
    pub total: String,
}

/// Everything needed to lay out an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub status: DisplayStatus,
    pub issued_on: NaiveDate,
    pub due_on: Option<NaiveDate>,
    pub issuer: Issuer,
    pub bill_to_company: String,
    pub bill_to_contact: Option<String>,
    pub bill_to_email: String,
    pub bill_to_address: Option<String>,
    pub lines: Vec<DocumentLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub branding: Branding,
}

impl InvoiceDocument {
    pub fn new(detail: &InvoiceDetail, issuer: &User, today: NaiveDate) -> Self {
        let invoice = &detail.invoice;
        let subtotal: Decimal = detail.items.iter().map(|item| item.total).sum();
        let tax = round_cents(subtotal * TAX_RATE_PERCENT / Decimal::ONE_HUNDRED);

        Self {
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.display_status(today),
            issued_on: invoice.created_at.date_naive(),
            due_on: invoice.due_date,
            issuer: Issuer::from_user(issuer),
            bill_to_company: detail.client.company_name.clone(),
            bill_to_contact: detail.client.contact_name.clone(),
            bill_to_email: detail.client.email.clone(),
            bill_to_address: detail.client.address.clone(),
            lines: detail
                .items
                .iter()
                .map(|item| DocumentLine {
                    description: item.description.clone(),
                    quantity: format_quantity(item.quantity),
                    unit_price: format_money(item.unit_price),
                    total: format_money(item.total),
                })
                .collect(),
            subtotal,
            tax,
            total: subtotal + tax,
            notes: invoice.notes.clone().filter(|n| !n.trim().is_empty()),
            branding: Branding::for_user(issuer),
        }
    }

    pub fn subtotal_display(&self) -> String {
        format_money(self.subtotal)
    }

    pub fn tax_display(&self) -> String {
        format_money(self.tax)
    }

    pub fn total_display(&self) -> String {
        format_money(self.total)
    }

    pub fn tax_label(&self) -> String {
        format!("Tax ({}%)", TAX_RATE_PERCENT.normalize())
    }

    pub fn due_display(&self) -> String {
        self.due_on
            .map(|d| d.format("%b %-d, %Y").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn issued_display(&self) -> String {
        self.issued_on.format("%b %-d, %Y").to_string()
    }

    /// Status label shown on documents, e.g. `OVERDUE`.
    pub fn status_label(&self) -> &'static str {
        match self.status {
            DisplayStatus::Draft => "DRAFT",
            DisplayStatus::Sent => "SENT",
            DisplayStatus::Paid => "PAID",
            DisplayStatus::Cancelled => "CANCELLED",
            DisplayStatus::Overdue => "OVERDUE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec!(200)), "$200.00");
        assert_eq!(format_money(dec!(0)), "$0.00");
        assert_eq!(format_money(dec!(29.985)), "$29.99");
        assert_eq!(format_money(dec!(1234567.5)), "$1,234,567.50");
        assert_eq!(format_money(dec!(999.999)), "$1,000.00");
        assert_eq!(format_money(dec!(-12.5)), "-$12.50");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(dec!(2.00)), "2");
        assert_eq!(format_quantity(dec!(1.50)), "1.5");
    }
}
