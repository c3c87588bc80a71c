//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use mailer::{MailerConfig, MailerError};

/// Where invoices, clients and users are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    /// Volatile, for demos and tests.
    Memory,
}

/// How outgoing email is delivered.
#[derive(Debug, Clone)]
pub enum MailBackend {
    Smtp(MailerConfig),
    /// Log messages instead of sending them.
    Log,
}

/// InvGen server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// Base URL used in emails and storage links.
    pub public_url: String,
    pub store_backend: StoreBackend,
    /// SQLite database URL.
    pub database_url: String,
    /// Root directory of the object store.
    pub storage_dir: PathBuf,
    /// Secret used to sign upload URLs.
    pub signing_secret: String,
    pub signed_url_ttl_secs: i64,
    pub session_ttl_hours: i64,
    pub mail: MailBackend,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `INVGEN_ADDR` | Server bind address | `127.0.0.1:3000` |
    /// | `PUBLIC_URL` | Base URL for links | `http://<INVGEN_ADDR>` |
    /// | `STORE_BACKEND` | `sqlite` or `memory` | `sqlite` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:invgen.db?mode=rwc` |
    /// | `STORAGE_DIR` | Object storage root | `./data/storage` |
    /// | `STORAGE_SIGNING_SECRET` | Upload URL signing secret | (required) |
    /// | `SIGNED_URL_TTL_SECS` | Upload URL lifetime | `7200` |
    /// | `SESSION_TTL_HOURS` | Login session lifetime | `720` |
    /// | `MAIL_BACKEND` | `smtp` or `log` | `smtp` |
    ///
    /// The `smtp` backend also reads `SMTP_HOST`, `SMTP_PORT`,
    /// `SMTP_USERNAME`, `SMTP_PASSWORD` and `EMAIL_FROM`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr: SocketAddr = lookup("INVGEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{addr}"))
            .trim_end_matches('/')
            .to_string();

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("sqlite") => StoreBackend::Sqlite,
            Some("memory") => StoreBackend::Memory,
            Some(other) => return Err(ConfigError::InvalidBackend("STORE_BACKEND", other.to_string())),
        };

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:invgen.db?mode=rwc".to_string());

        let storage_dir = lookup("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/storage"));

        let signing_secret = lookup("STORAGE_SIGNING_SECRET")
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingSigningSecret)?;

        let signed_url_ttl_secs = parse_positive(&lookup, "SIGNED_URL_TTL_SECS", 7200)?;
        let session_ttl_hours = parse_positive(&lookup, "SESSION_TTL_HOURS", 720)?;

        let mail = match lookup("MAIL_BACKEND").as_deref() {
            None | Some("smtp") => MailBackend::Smtp(MailerConfig::from_lookup(&lookup)?),
            Some("log") => MailBackend::Log,
            Some(other) => return Err(ConfigError::InvalidBackend("MAIL_BACKEND", other.to_string())),
        };

        Ok(Self {
            addr,
            public_url,
            store_backend,
            database_url,
            storage_dir,
            signing_secret,
            signed_url_ttl_secs,
            session_ttl_hours,
            mail,
        })
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidNumber(key)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid INVGEN_ADDR format")]
    InvalidAddr,

    #[error("STORAGE_SIGNING_SECRET environment variable is required")]
    MissingSigningSecret,

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),

    #[error("Unknown {0} value: {1}")]
    InvalidBackend(&'static str, String),

    #[error("Mail configuration: {0}")]
    Mail(#[from] MailerError),
}
