//! Invoice and invoice item operations.
//!
//! Every write that touches more than one row (header + lines, number
//! counter + header) runs inside a single transaction.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::client;
use crate::error::{DatabaseError, Result};
use crate::models::{
    build_items, invoice_amount, Invoice, InvoiceDetail, InvoiceItem, InvoiceStats,
    InvoiceStatus, InvoiceUpdate, InvoiceWithClient, NewInvoice,
};
use crate::numbering::{self, InvoiceNumber};

const INVOICE_COLUMNS: &str = r#"
    id, user_id, client_id, invoice_number, status, amount, due_date, notes,
    created_at, updated_at
"#;

/// Create an invoice and its lines, allocating the next number for the user.
///
/// The invoice starts as `DRAFT` and its amount is the sum of the line totals.
pub async fn create_invoice(pool: &SqlitePool, new: &NewInvoice) -> Result<Invoice> {
    let mut tx = pool.begin().await?;

    let number = numbering::allocate(&mut tx, &new.user_id).await?;
    let now = Utc::now();
    let invoice = Invoice {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: new.user_id.clone(),
        client_id: new.client_id.clone(),
        invoice_number: number.to_string(),
        status: InvoiceStatus::Draft,
        amount: invoice_amount(&new.items),
        due_date: new.due_date,
        notes: new.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, user_id, client_id, invoice_number, status, amount, due_date,
            notes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.user_id)
    .bind(&invoice.client_id)
    .bind(&invoice.invoice_number)
    .bind(invoice.status)
    .bind(invoice.amount.to_string())
    .bind(invoice.due_date)
    .bind(&invoice.notes)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| DatabaseError::from_write(e, "Invoice", &invoice.invoice_number))?;

    insert_items(&mut tx, &build_items(&invoice.id, &new.items)).await?;

    tx.commit().await?;

    tracing::debug!(
        invoice_id = %invoice.id,
        invoice_number = %invoice.invoice_number,
        "Invoice created"
    );

    Ok(invoice)
}

/// Get an invoice header by ID.
pub async fn get_invoice(pool: &SqlitePool, id: &str) -> Result<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(invoice)
}

/// Get the lines of an invoice in display order.
pub async fn get_invoice_items(pool: &SqlitePool, invoice_id: &str) -> Result<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, position, description, quantity, unit_price, total
        FROM invoice_items
        WHERE invoice_id = ?
        ORDER BY position
        "#,
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

/// Get an invoice with its client and lines.
pub async fn get_invoice_detail(pool: &SqlitePool, id: &str) -> Result<Option<InvoiceDetail>> {
    let Some(invoice) = get_invoice(pool, id).await? else {
        return Ok(None);
    };

    let client = client::get_client(pool, &invoice.client_id)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "Client",
            id: invoice.client_id.clone(),
        })?;
    let items = get_invoice_items(pool, &invoice.id).await?;

    Ok(Some(InvoiceDetail {
        invoice,
        client,
        items,
    }))
}

/// List a user's invoices, newest first, each with its client.
pub async fn list_invoices_by_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<InvoiceWithClient>> {
    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        r#"
        SELECT {INVOICE_COLUMNS}
        FROM invoices
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let clients: HashMap<String, _> = client::list_clients_by_user(pool, user_id)
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    invoices
        .into_iter()
        .map(|invoice| {
            let client = clients
                .get(&invoice.client_id)
                .cloned()
                .ok_or_else(|| DatabaseError::NotFound {
                    entity: "Client",
                    id: invoice.client_id.clone(),
                })?;
            Ok(InvoiceWithClient { invoice, client })
        })
        .collect()
}

/// Apply a partial update.
///
/// Replacing the lines always recomputes the amount from the new lines.
/// With `expected_status` set, nothing is written unless the stored status
/// still matches.
pub async fn update_invoice(pool: &SqlitePool, id: &str, update: &InvoiceUpdate) -> Result<Invoice> {
    let mut tx = pool.begin().await?;
    let now = Utc::now();

    // Write first so the lock is held before the status is read.
    let touched = sqlx::query("UPDATE invoices SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if touched.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Invoice",
            id: id.to_string(),
        });
    }

    let mut invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(expected) = update.expected_status {
        if invoice.status != expected {
            return Err(DatabaseError::StatusChanged {
                id: id.to_string(),
                expected,
                actual: invoice.status,
            });
        }
    }

    if let Some(status) = update.status {
        invoice.status = status;
    }
    if let Some(due_date) = update.due_date {
        invoice.due_date = due_date;
    }
    if let Some(notes) = &update.notes {
        invoice.notes = notes.clone();
    }
    if let Some(items) = &update.items {
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, &build_items(id, items)).await?;
        invoice.amount = invoice_amount(items);
    }
    invoice.updated_at = now;

    sqlx::query(
        r#"
        UPDATE invoices
        SET status = ?, amount = ?, due_date = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(invoice.status)
    .bind(invoice.amount.to_string())
    .bind(invoice.due_date)
    .bind(&invoice.notes)
    .bind(invoice.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(invoice)
}

/// Delete an invoice and its lines.
pub async fn delete_invoice(pool: &SqlitePool, id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM invoices WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Invoice",
            id: id.to_string(),
        });
    }

    tx.commit().await?;
    Ok(())
}

/// Preview the next invoice number for a user without reserving it.
pub async fn peek_next_invoice_number(pool: &SqlitePool, user_id: &str) -> Result<InvoiceNumber> {
    let mut conn = pool.acquire().await?;
    numbering::peek_next(&mut conn, user_id).await
}

/// Revenue and counts over a user's invoices.
pub async fn invoice_stats(pool: &SqlitePool, user_id: &str) -> Result<InvoiceStats> {
    let invoices = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = ?"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(InvoiceStats::from_invoices(&invoices))
}

async fn insert_items(conn: &mut SqliteConnection, items: &[InvoiceItem]) -> Result<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, position, description, quantity, unit_price, total
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.invoice_id)
        .bind(item.position)
        .bind(&item.description)
        .bind(item.quantity.to_string())
        .bind(item.unit_price.to_string())
        .bind(item.total.to_string())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
