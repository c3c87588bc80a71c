//! Login session storage.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Session;

/// Store a new session.
pub async fn create_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&session.token_hash)
    .bind(&session.user_id)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_write(e, "Session", &session.user_id))?;

    Ok(())
}

/// Look up a session by the digest of its token.
pub async fn get_session(pool: &SqlitePool, token_hash: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        SELECT token_hash, user_id, created_at, expires_at
        FROM sessions
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// Delete a session. Returns true if one was removed.
pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE token_hash = ?
        "#,
    )
    .bind(token_hash)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every session that expired at or before `now`.
pub async fn delete_expired_sessions(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE expires_at <= ?
        "#,
    )
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
