//! Client CRUD operations.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{Client, ClientUpdate, NewClient};

const CLIENT_COLUMNS: &str = r#"
    id, user_id, company_name, contact_name, email, phone, address, website, notes,
    created_at, updated_at
"#;

/// Create a client for a user.
pub async fn create_client(pool: &SqlitePool, new: &NewClient) -> Result<Client> {
    let now = Utc::now();
    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: new.user_id.clone(),
        company_name: new.company_name.clone(),
        contact_name: new.contact_name.clone(),
        email: new.email.clone(),
        phone: new.phone.clone(),
        address: new.address.clone(),
        website: new.website.clone(),
        notes: new.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO clients (
            id, user_id, company_name, contact_name, email, phone, address,
            website, notes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&client.id)
    .bind(&client.user_id)
    .bind(&client.company_name)
    .bind(&client.contact_name)
    .bind(&client.email)
    .bind(&client.phone)
    .bind(&client.address)
    .bind(&client.website)
    .bind(&client.notes)
    .bind(client.created_at)
    .bind(client.updated_at)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_write(e, "Client", &client.id))?;

    Ok(client)
}

/// Get a client by ID.
pub async fn get_client(pool: &SqlitePool, id: &str) -> Result<Option<Client>> {
    let client = sqlx::query_as::<_, Client>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(client)
}

/// List a user's clients, newest first.
pub async fn list_clients_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Client>> {
    let clients = sqlx::query_as::<_, Client>(&format!(
        r#"
        SELECT {CLIENT_COLUMNS}
        FROM clients
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(clients)
}

/// Apply a partial update and return the stored client.
pub async fn update_client(pool: &SqlitePool, id: &str, update: &ClientUpdate) -> Result<Client> {
    // Nullable fields bind a "present" flag and the new value, so NULL can clear.
    let result = sqlx::query(
        r#"
        UPDATE clients
        SET company_name = COALESCE(?, company_name),
            contact_name = CASE WHEN ? THEN ? ELSE contact_name END,
            email = COALESCE(?, email),
            phone = CASE WHEN ? THEN ? ELSE phone END,
            address = CASE WHEN ? THEN ? ELSE address END,
            website = CASE WHEN ? THEN ? ELSE website END,
            notes = CASE WHEN ? THEN ? ELSE notes END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&update.company_name)
    .bind(update.contact_name.is_some())
    .bind(update.contact_name.clone().flatten())
    .bind(&update.email)
    .bind(update.phone.is_some())
    .bind(update.phone.clone().flatten())
    .bind(update.address.is_some())
    .bind(update.address.clone().flatten())
    .bind(update.website.is_some())
    .bind(update.website.clone().flatten())
    .bind(update.notes.is_some())
    .bind(update.notes.clone().flatten())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        });
    }

    get_client(pool, id).await?.ok_or_else(|| DatabaseError::NotFound {
        entity: "Client",
        id: id.to_string(),
    })
}

/// Delete a client.
///
/// Fails with `Constraint` while an invoice still references the client.
pub async fn delete_client(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM clients
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_write(e, "Client", id))?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Client",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Count the invoices billed to a client.
pub async fn count_client_invoices(pool: &SqlitePool, client_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM invoices WHERE client_id = ?
        "#,
    )
    .bind(client_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
