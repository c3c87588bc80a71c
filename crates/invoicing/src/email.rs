//! Outgoing email composition.

use askama::Template;
use mailer::{Attachment, Email};

use crate::branding::Branding;
use crate::document::InvoiceDocument;
use crate::error::Result;

/// Values shared by the HTML and text invoice emails.
struct InvoiceMessage<'a> {
    invoice_number: &'a str,
    greeting: &'a str,
    issuer: &'a str,
    amount: String,
    due_date: String,
    pdf_url: &'a str,
    primary: &'a str,
    secondary: &'a str,
    logo_url: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/invoice.html")]
struct InvoiceHtml<'a> {
    m: &'a InvoiceMessage<'a>,
}

#[derive(Template)]
#[template(path = "email/invoice.txt")]
struct InvoiceText<'a> {
    m: &'a InvoiceMessage<'a>,
}

struct VerificationMessage<'a> {
    user_name: &'a str,
    verification_url: &'a str,
    primary: &'a str,
    secondary: &'a str,
}

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationHtml<'a> {
    m: &'a VerificationMessage<'a>,
}

#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationText<'a> {
    m: &'a VerificationMessage<'a>,
}

pub fn invoice_subject(invoice_number: &str) -> String {
    format!("Invoice #{invoice_number} from InvGen")
}

pub const VERIFICATION_SUBJECT: &str = "Verify your email address - InvGen";

/// File name of the PDF attached to an invoice email.
pub fn attachment_name(invoice_number: &str) -> String {
    format!("invoice-{invoice_number}.pdf")
}

/// Build the email that delivers an invoice to its client.
pub fn invoice_email(
    doc: &InvoiceDocument,
    greeting: &str,
    pdf_url: &str,
    pdf: Vec<u8>,
) -> Result<Email> {
    let message = InvoiceMessage {
        invoice_number: &doc.invoice_number,
        greeting,
        issuer: doc.issuer.company.as_deref().unwrap_or(&doc.issuer.name),
        amount: doc.total_display(),
        due_date: doc.due_display(),
        pdf_url,
        primary: doc.branding.theme.primary,
        secondary: doc.branding.theme.secondary,
        logo_url: doc.branding.logo_url.as_deref(),
    };

    let text = InvoiceText { m: &message }.render()?;
    let html = InvoiceHtml { m: &message }.render()?;

    Ok(
        Email::new(&doc.bill_to_email, invoice_subject(&doc.invoice_number), text)
            .html(html)
            .attach(Attachment::pdf(attachment_name(&doc.invoice_number), pdf)),
    )
}

/// Build the account verification email.
pub fn verification_email(
    to: &str,
    user_name: &str,
    verification_url: &str,
    branding: &Branding,
) -> Result<Email> {
    let message = VerificationMessage {
        user_name,
        verification_url,
        primary: branding.theme.primary,
        secondary: branding.theme.secondary,
    };

    let text = VerificationText { m: &message }.render()?;
    let html = VerificationHtml { m: &message }.render()?;

    Ok(Email::new(to, VERIFICATION_SUBJECT, text).html(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branding::theme_or_default;
    use crate::document::{DocumentLine, Issuer};
    use chrono::NaiveDate;
    use database::DisplayStatus;
    use rust_decimal_macros::dec;

    fn document() -> InvoiceDocument {
        InvoiceDocument {
            invoice_number: "INV-00007".to_string(),
            status: DisplayStatus::Draft,
            issued_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_on: NaiveDate::from_ymd_opt(2024, 3, 31),
            issuer: Issuer {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                company: None,
            },
            bill_to_company: "Acme".to_string(),
            bill_to_contact: Some("Wile".to_string()),
            bill_to_email: "a@acme.com".to_string(),
            bill_to_address: None,
            lines: vec![DocumentLine {
                description: "Design".to_string(),
                quantity: "2".to_string(),
                unit_price: "$100.00".to_string(),
                total: "$200.00".to_string(),
            }],
            subtotal: dec!(200),
            tax: dec!(0),
            total: dec!(200),
            notes: None,
            branding: Branding {
                theme: theme_or_default(Some("bold-red")),
                logo_url: None,
            },
        }
    }

    #[test]
    fn test_invoice_email() {
        let email = invoice_email(
            &document(),
            "Wile",
            "http://localhost:3000/storage/invoice-attachments/u1/invoice-INV-00007-1.pdf",
            b"%PDF-1.5".to_vec(),
        )
        .unwrap();

        assert_eq!(email.to, vec!["a@acme.com".to_string()]);
        assert_eq!(email.subject, "Invoice #INV-00007 from InvGen");
        assert!(email.body.contains("Hello Wile,"));
        assert!(email.body.contains("Amount Due: $200.00"));
        assert!(email.body.contains("Due Date: Mar 31, 2024"));
        assert!(email.body.contains("invoice-INV-00007-1.pdf"));
        assert!(email.body.contains("The InvGen Team"));

        let html = email.html_body.unwrap();
        assert!(html.contains("#dc2626"));
        assert!(html.contains("View Invoice PDF"));

        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].filename, "invoice-INV-00007.pdf");
        assert_eq!(email.attachments[0].content_type, "application/pdf");
    }

    #[test]
    fn test_invoice_email_escapes_html() {
        let email = invoice_email(&document(), "<script>", "http://x", Vec::new()).unwrap();
        let html = email.html_body.unwrap();
        assert!(!html.contains("<script>"));
        // Plain text is not escaped.
        assert!(email.body.contains("Hello <script>,"));
    }

    #[test]
    fn test_verification_email() {
        let email = verification_email(
            "new@example.com",
            "Alice",
            "http://localhost:3000/verify-email?token=abc123",
            &Branding::default(),
        )
        .unwrap();

        assert_eq!(email.subject, "Verify your email address - InvGen");
        assert!(email.body.contains("Hi Alice,"));
        assert!(email.body.contains("verify-email?token=abc123"));
        assert!(email.html_body.unwrap().contains("#f97316"));
        assert!(email.attachments.is_empty());
    }
}
