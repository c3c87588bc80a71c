//! Invoice PDF rendering.
//!
//! Pages are A4 and drawn with the standard Helvetica fonts, so no font
//! files are embedded. Long invoices continue on further pages with the
//! table header repeated.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;

use crate::branding::hex_to_rgb;
use crate::document::InvoiceDocument;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 40.0;
const BOTTOM: f32 = 90.0;
const ROW_HEIGHT: f32 = 20.0;
const MAX_DESCRIPTION_CHARS: usize = 52;

// Right edges of the numeric table columns.
const QTY_RIGHT: f32 = 350.0;
const PRICE_RIGHT: f32 = 450.0;
const TOTAL_RIGHT: f32 = PAGE_WIDTH - MARGIN - 8.0;

type Rgb = (f32, f32, f32);

const WHITE: Rgb = (1.0, 1.0, 1.0);
const INK: Rgb = (0.07, 0.09, 0.15);
const MUTED: Rgb = (0.42, 0.45, 0.5);
const RULE: Rgb = (0.9, 0.91, 0.92);

/// Errors raised while producing a PDF.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF encoding failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Encode text for a WinAnsi-encoded standard font. Characters outside the
/// encoding become `?`.
pub(crate) fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '\t' | '\n' | '\r' => b' ',
            _ => b'?',
        })
        .collect()
}

/// Approximate Helvetica advance width, used for right alignment.
fn text_width(text: &str, size: f32) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            '0'..='9' | '$' => 0.556,
            '.' | ',' | ' ' | 'i' | 'l' | 'j' | 't' | 'f' | 'I' => 0.278,
            'm' | 'w' | 'M' | 'W' => 0.833,
            'A'..='Z' => 0.667,
            _ => 0.5,
        })
        .sum();
    em * size
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Accumulates drawing operations page by page.
struct Layout {
    pages: Vec<Vec<Operation>>,
    y: f32,
    primary: Rgb,
    secondary: Rgb,
}

impl Layout {
    fn new(primary: Rgb, secondary: Rgb) -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
            primary,
            secondary,
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn fill_color(&mut self, (r, g, b): Rgb) {
        self.ops()
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    }

    fn rect(&mut self, color: Rgb, x: f32, y: f32, w: f32, h: f32) {
        self.fill_color(color);
        self.ops()
            .push(Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]));
        self.ops().push(Operation::new("f", vec![]));
    }

    fn text(&mut self, font: Font, size: f32, color: Rgb, x: f32, y: f32, text: &str) {
        self.fill_color(color);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource().as_bytes().to_vec()), size.into()],
        ));
        ops.push(Operation::new("Td", vec![x.into(), y.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    fn text_right(&mut self, font: Font, size: f32, color: Rgb, right: f32, y: f32, text: &str) {
        let x = right - text_width(text, size);
        self.text(font, size, color, x, y, text);
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn table_header(&mut self) {
        let y = self.y;
        self.rect(self.secondary, MARGIN, y - 22.0, PAGE_WIDTH - 2.0 * MARGIN, 22.0);
        self.text(Font::Bold, 9.0, WHITE, MARGIN + 8.0, y - 15.0, "DESCRIPTION");
        self.text_right(Font::Bold, 9.0, WHITE, QTY_RIGHT, y - 15.0, "QTY");
        self.text_right(Font::Bold, 9.0, WHITE, PRICE_RIGHT, y - 15.0, "UNIT PRICE");
        self.text_right(Font::Bold, 9.0, WHITE, TOTAL_RIGHT, y - 15.0, "TOTAL");
        self.y -= 22.0;
    }

    /// Start a new page when fewer than `needed` points remain.
    fn ensure_space(&mut self, needed: f32, repeat_header: bool) {
        if self.y - needed < BOTTOM {
            self.new_page();
            if repeat_header {
                self.table_header();
            }
        }
    }
}

fn draw_header(layout: &mut Layout, doc: &InvoiceDocument) {
    let band_bottom = PAGE_HEIGHT - 100.0;
    layout.rect(layout.primary, 0.0, band_bottom, PAGE_WIDTH, 100.0);
    layout.text(Font::Bold, 26.0, WHITE, MARGIN, PAGE_HEIGHT - 52.0, "INVOICE");
    layout.text(
        Font::Regular,
        12.0,
        WHITE,
        MARGIN,
        PAGE_HEIGHT - 72.0,
        &doc.invoice_number,
    );

    let right = PAGE_WIDTH - MARGIN;
    let issuer_title = doc.issuer.company.as_deref().unwrap_or(&doc.issuer.name);
    layout.text_right(Font::Bold, 13.0, WHITE, right, PAGE_HEIGHT - 50.0, issuer_title);
    if doc.issuer.company.is_some() {
        layout.text_right(Font::Regular, 10.0, WHITE, right, PAGE_HEIGHT - 66.0, &doc.issuer.name);
    }
    layout.text_right(Font::Regular, 10.0, WHITE, right, PAGE_HEIGHT - 80.0, &doc.issuer.email);

    layout.y = band_bottom - 30.0;
}

fn draw_parties(layout: &mut Layout, doc: &InvoiceDocument) {
    let top = layout.y;
    let mut y = top;

    layout.text(Font::Bold, 9.0, MUTED, MARGIN, y, "BILL TO");
    y -= 18.0;
    layout.text(Font::Bold, 13.0, INK, MARGIN, y, &doc.bill_to_company);
    for line in [doc.bill_to_contact.as_deref(), Some(doc.bill_to_email.as_str())]
        .into_iter()
        .flatten()
        .chain(doc.bill_to_address.iter().flat_map(|a| a.lines()))
    {
        y -= 14.0;
        layout.text(Font::Regular, 10.0, MUTED, MARGIN, y, line);
    }

    let label_right = PAGE_WIDTH - MARGIN - 110.0;
    let value_right = PAGE_WIDTH - MARGIN;
    let mut dy = top;
    for (label, value) in [
        ("Invoice Date", doc.issued_display()),
        ("Due Date", doc.due_display()),
        ("Status", doc.status_label().to_string()),
    ] {
        layout.text_right(Font::Bold, 9.0, MUTED, label_right, dy, label);
        layout.text_right(Font::Regular, 10.0, INK, value_right, dy, &value);
        dy -= 16.0;
    }

    layout.y = y.min(dy) - 30.0;
}

fn draw_items(layout: &mut Layout, doc: &InvoiceDocument) {
    layout.ensure_space(22.0 + ROW_HEIGHT, false);
    layout.table_header();

    for line in &doc.lines {
        layout.ensure_space(ROW_HEIGHT, true);
        let baseline = layout.y - 14.0;
        let description = truncate(&line.description, MAX_DESCRIPTION_CHARS);

        layout.text(Font::Regular, 10.0, INK, MARGIN + 8.0, baseline, &description);
        layout.text_right(Font::Regular, 10.0, MUTED, QTY_RIGHT, baseline, &line.quantity);
        layout.text_right(Font::Regular, 10.0, MUTED, PRICE_RIGHT, baseline, &line.unit_price);
        layout.text_right(Font::Bold, 10.0, INK, TOTAL_RIGHT, baseline, &line.total);
        layout.rect(RULE, MARGIN, layout.y - ROW_HEIGHT, PAGE_WIDTH - 2.0 * MARGIN, 0.5);
        layout.y -= ROW_HEIGHT;
    }
}

fn draw_totals(layout: &mut Layout, doc: &InvoiceDocument) {
    layout.ensure_space(80.0, false);
    let label_x = PRICE_RIGHT - 60.0;
    let mut y = layout.y - 24.0;

    for (label, value) in [
        ("Subtotal".to_string(), doc.subtotal_display()),
        (doc.tax_label(), doc.tax_display()),
    ] {
        layout.text(Font::Regular, 10.0, MUTED, label_x, y, &label);
        layout.text_right(Font::Regular, 10.0, INK, TOTAL_RIGHT, y, &value);
        y -= 16.0;
    }

    layout.rect(layout.primary, label_x, y + 8.0, TOTAL_RIGHT - label_x, 1.0);
    y -= 10.0;
    let primary = layout.primary;
    layout.text(Font::Bold, 13.0, INK, label_x, y, "Total");
    layout.text_right(Font::Bold, 13.0, primary, TOTAL_RIGHT, y, &doc.total_display());

    layout.y = y - 30.0;
}

fn draw_notes(layout: &mut Layout, doc: &InvoiceDocument) {
    let Some(notes) = &doc.notes else {
        return;
    };

    layout.ensure_space(40.0, false);
    layout.text(Font::Bold, 9.0, MUTED, MARGIN, layout.y, "NOTES");
    layout.y -= 16.0;
    for line in notes.lines() {
        layout.ensure_space(14.0, false);
        layout.text(Font::Regular, 10.0, INK, MARGIN, layout.y, line);
        layout.y -= 14.0;
    }
}

fn footer(page: usize, count: usize) -> Vec<Operation> {
    let mut layout = Layout::new(WHITE, WHITE);
    layout.text(Font::Regular, 9.0, MUTED, MARGIN, 40.0, "Thank you for your business!");
    layout.text_right(
        Font::Regular,
        9.0,
        MUTED,
        PAGE_WIDTH - MARGIN,
        40.0,
        &format!("Page {} of {}", page, count),
    );
    layout.pages.remove(0)
}

/// Render an invoice to PDF bytes.
pub fn render_invoice_pdf(doc: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
    let primary = hex_to_rgb(doc.branding.theme.primary).unwrap_or(INK);
    let secondary = hex_to_rgb(doc.branding.theme.secondary).unwrap_or(INK);

    let mut layout = Layout::new(primary, secondary);
    draw_header(&mut layout, doc);
    draw_parties(&mut layout, doc);
    draw_items(&mut layout, doc);
    draw_totals(&mut layout, doc);
    draw_notes(&mut layout, doc);

    assemble(doc, layout.pages)
}

fn assemble(doc: &InvoiceDocument, pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, RenderError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let regular_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    // The issuer block on the first page links to the company logo.
    let logo_link: Option<ObjectId> = doc.branding.logo_url.as_ref().map(|url| {
        pdf.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![
                (PAGE_WIDTH - 240.0).into(),
                (PAGE_HEIGHT - 90.0).into(),
                (PAGE_WIDTH - MARGIN).into(),
                (PAGE_HEIGHT - 36.0).into(),
            ],
            "Border" => vec![0.into(), 0.into(), 0.into()],
            "A" => dictionary! {
                "S" => "URI",
                "URI" => Object::string_literal(url.as_str()),
            },
        })
    });

    let count = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(count);
    for (index, mut operations) in pages.into_iter().enumerate() {
        operations.extend(footer(index + 1, count));
        let content = Content { operations }
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let (0, Some(link_id)) = (index, logo_link) {
            page.set("Annots", vec![Object::Reference(link_id)]);
        }
        kids.push(pdf.add_object(page).into());
    }

    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(format!("Invoice {}", doc.invoice_number)),
        "Producer" => Object::string_literal("InvGen"),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InvoiceDocument;
    use chrono::{NaiveDate, Utc};
    use database::{Client, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus, User};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            name: Some("Alice".to_string()),
            verification_token: None,
            verification_expires_at: None,
            email_verified_at: Some(Utc::now()),
            profile_picture_url: None,
            company_logo_url: Some("http://localhost:3000/storage/logos/u1/logo.png".to_string()),
            brand_theme: Some("nature-green".to_string()),
            first_name: None,
            last_name: None,
            company: Some("Alice Design Ltd".to_string()),
            designation: None,
            department: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn detail(lines: usize) -> InvoiceDetail {
        let items: Vec<InvoiceItem> = (0..lines)
            .map(|i| InvoiceItem {
                id: format!("item-{i}"),
                invoice_id: "inv".to_string(),
                position: i as i64,
                description: if i == 0 { "Design".to_string() } else { format!("Line {i}") },
                quantity: dec!(2),
                unit_price: dec!(100),
                total: dec!(200),
            })
            .collect();
        let amount: Decimal = items.iter().map(|i| i.total).sum();

        InvoiceDetail {
            invoice: Invoice {
                id: "inv".to_string(),
                user_id: "u1".to_string(),
                client_id: "c1".to_string(),
                invoice_number: "INV-00001".to_string(),
                status: InvoiceStatus::Draft,
                amount,
                due_date: NaiveDate::from_ymd_opt(2030, 1, 31),
                notes: Some("Net 30 (bank transfer)".to_string()),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            client: Client {
                id: "c1".to_string(),
                user_id: "u1".to_string(),
                company_name: "Acme".to_string(),
                contact_name: Some("Wile E.".to_string()),
                email: "a@acme.com".to_string(),
                phone: None,
                address: Some("1 Desert Road\nMesa".to_string()),
                website: None,
                notes: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            items,
        }
    }

    fn page_strings(bytes: &[u8]) -> Vec<Vec<String>> {
        let pdf = Document::load_mem(bytes).unwrap();
        pdf.get_pages()
            .values()
            .map(|page_id| {
                let raw = pdf.get_page_content(*page_id).unwrap();
                Content::decode(&raw)
                    .unwrap()
                    .operations
                    .into_iter()
                    .filter(|op| op.operator == "Tj")
                    .filter_map(|op| match op.operands.first() {
                        Some(Object::String(bytes, _)) => {
                            Some(String::from_utf8_lossy(bytes).into_owned())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_render_single_page() {
        let doc = InvoiceDocument::new(&detail(1), &user(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let bytes = render_invoice_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let pages = page_strings(&bytes);
        assert_eq!(pages.len(), 1);
        let text = &pages[0];
        for expected in [
            "INVOICE",
            "INV-00001",
            "Alice Design Ltd",
            "Acme",
            "a@acme.com",
            "Mesa",
            "Design",
            "$200.00",
            "Tax (0%)",
            "$0.00",
            "Net 30 (bank transfer)",
            "Page 1 of 1",
        ] {
            assert!(text.iter().any(|s| s == expected), "missing {expected:?} in {text:?}");
        }
    }

    #[test]
    fn test_long_invoices_paginate() {
        let doc = InvoiceDocument::new(&detail(60), &user(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let pages = page_strings(&render_invoice_pdf(&doc).unwrap());

        assert!(pages.len() >= 2);
        let last = pages.last().unwrap();
        assert!(last.iter().any(|s| s == "$12,000.00"));
        // Header repeats on continuation pages.
        assert!(pages[1].iter().any(|s| s == "DESCRIPTION"));
    }

    #[test]
    fn test_win_ansi() {
        assert_eq!(win_ansi("Café – 5€"), b"Caf\xe9 \x96 5\x80".to_vec());
        assert_eq!(win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description", 10), "a very ...");
    }
}
