//! User CRUD operations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewUser, User, UserUpdate};

const USER_COLUMNS: &str = r#"
    id, email, password_hash, name, verification_token, verification_expires_at,
    email_verified_at, profile_picture_url, company_logo_url, brand_theme,
    first_name, last_name, company, designation, department, created_at, updated_at
"#;

/// Create a new, unverified user.
pub async fn create_user(pool: &SqlitePool, new: &NewUser) -> Result<User> {
    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: new.email.clone(),
        password_hash: new.password_hash.clone(),
        name: new.name.clone(),
        verification_token: new.verification_token.clone(),
        verification_expires_at: new.verification_expires_at,
        email_verified_at: None,
        profile_picture_url: None,
        company_logo_url: None,
        brand_theme: None,
        first_name: None,
        last_name: None,
        company: None,
        designation: None,
        department: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO users (
            id, email, password_hash, name, verification_token,
            verification_expires_at, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.verification_token)
    .bind(user.verification_expires_at)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::from_write(e, "User", &user.email))?;

    Ok(user)
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Get a user by email.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Apply a partial profile update and return the stored user.
pub async fn update_user(pool: &SqlitePool, id: &str, update: &UserUpdate) -> Result<User> {
    // Each field binds a "present" flag and the new value, so NULL can clear.
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = CASE WHEN ? THEN ? ELSE name END,
            profile_picture_url = CASE WHEN ? THEN ? ELSE profile_picture_url END,
            company_logo_url = CASE WHEN ? THEN ? ELSE company_logo_url END,
            brand_theme = CASE WHEN ? THEN ? ELSE brand_theme END,
            first_name = CASE WHEN ? THEN ? ELSE first_name END,
            last_name = CASE WHEN ? THEN ? ELSE last_name END,
            company = CASE WHEN ? THEN ? ELSE company END,
            designation = CASE WHEN ? THEN ? ELSE designation END,
            department = CASE WHEN ? THEN ? ELSE department END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(update.name.is_some())
    .bind(update.name.clone().flatten())
    .bind(update.profile_picture_url.is_some())
    .bind(update.profile_picture_url.clone().flatten())
    .bind(update.company_logo_url.is_some())
    .bind(update.company_logo_url.clone().flatten())
    .bind(update.brand_theme.is_some())
    .bind(update.brand_theme.clone().flatten())
    .bind(update.first_name.is_some())
    .bind(update.first_name.clone().flatten())
    .bind(update.last_name.is_some())
    .bind(update.last_name.clone().flatten())
    .bind(update.company.is_some())
    .bind(update.company.clone().flatten())
    .bind(update.designation.is_some())
    .bind(update.designation.clone().flatten())
    .bind(update.department.is_some())
    .bind(update.department.clone().flatten())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    get_user(pool, id).await?.ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Consume an email verification token.
///
/// Clears the token and stamps the verification time in one statement, so a
/// token can only ever be consumed once. Returns `None` when the token is
/// unknown, already used, or expired.
pub async fn verify_email_token(
    pool: &SqlitePool,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET email_verified_at = ?,
            verification_token = NULL,
            verification_expires_at = NULL,
            updated_at = ?
        WHERE verification_token = ?
          AND (verification_expires_at IS NULL OR verification_expires_at > ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(now)
    .bind(now)
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}
