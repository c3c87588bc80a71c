//! InvGen HTTP server.
//!
//! Serves the JSON API, signed object storage and the server-rendered
//! verification and invoice preview pages.

mod auth;
mod config;
mod error;
mod extract;
mod routes;
mod state;

use std::sync::Arc;

use invoicing::mail::{LoggingDispatch, MailDispatch};
use invoicing::storage::{LocalObjectStore, ObjectStore, UrlSigner};
use invoicing::store::{MemoryStore, SqliteStore, Store};
use invoicing::AccountSettings;
use mailer::SmtpMailer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, MailBackend, StoreBackend};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, public_url = %config.public_url, "Starting InvGen server");

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(&config.database_url).await?),
        StoreBackend::Memory => {
            warn!("Using in-memory store, data will be lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let signer = UrlSigner::new(
        config.public_url.clone(),
        config.signing_secret.clone(),
        chrono::Duration::seconds(config.signed_url_ttl_secs),
    );
    let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(config.storage_dir.clone(), signer));

    let mail: Arc<dyn MailDispatch> = match &config.mail {
        MailBackend::Smtp(mailer_config) => Arc::new(SmtpMailer::new(mailer_config.clone())?),
        MailBackend::Log => {
            warn!("MAIL_BACKEND=log, emails will only be logged");
            Arc::new(LoggingDispatch)
        }
    };

    let settings = AccountSettings::new(config.public_url.clone())
        .with_session_ttl(chrono::Duration::hours(config.session_ttl_hours));
    let state = AppState::new(store, objects, mail, settings);

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    info!(addr = %config.addr, "InvGen server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
