//! SQLite persistence layer for InvGen.
//!
//! This crate provides async database operations for users, sessions,
//! clients and invoices using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{client, models::NewClient, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:invgen.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let clients = client::list_clients_by_user(db.pool(), "user-id").await?;
//!     println!("{} clients", clients.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod invoice;
pub mod models;
pub mod numbering;
pub mod session;
pub mod user;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    Client, ClientUpdate, DisplayStatus, Invoice, InvoiceDetail, InvoiceItem, InvoiceStats,
    InvoiceStatus, InvoiceUpdate, InvoiceWithClient, NewClient, NewInvoice, NewInvoiceItem,
    NewUser, Session, User, UserUpdate,
};
pub use numbering::{InvoiceNumber, NumberingError};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// let db = database::Database::connect("sqlite:data/invgen.db?mode=rwc").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// Every connection to `sqlite::memory:` opens a separate database, so
    /// in-memory databases should use a pool size of 1.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        // Writers queue on the database lock instead of failing with SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
