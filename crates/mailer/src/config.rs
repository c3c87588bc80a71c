use secrecy::{ExposeSecret, SecretString};
use std::env;

use crate::MailerError;

/// Default SMTP port (implicit TLS).
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465).
    Wrapper,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
}

impl TlsMode {
    /// Conventional mode for a port.
    pub fn for_port(port: u16) -> Self {
        if port == DEFAULT_SMTP_PORT {
            TlsMode::Wrapper
        } else {
            TlsMode::StartTls
        }
    }
}

/// SMTP relay configuration.
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub tls: TlsMode,
    /// SMTP login.
    pub username: String,
    /// Sender mailbox, e.g. `InvGen <billing@example.com>`.
    pub from: String,
    password: SecretString,
}

impl MailerConfig {
    /// Create a new configuration with explicit values.
    ///
    /// The sender defaults to the username and the TLS mode to the
    /// convention for the port.
    pub fn new(
        smtp_host: impl Into<String>,
        smtp_port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            smtp_host: smtp_host.into(),
            smtp_port,
            tls: TlsMode::for_port(smtp_port),
            from: username.clone(),
            username,
            password: SecretString::from(password.into()),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Required:
    /// - `SMTP_HOST`
    /// - `SMTP_USERNAME`
    /// - `SMTP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `SMTP_PORT` - Default: 465
    /// - `EMAIL_FROM` - Default: `SMTP_USERNAME`
    pub fn from_env() -> Result<Self, MailerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MailerError> {
        let required = |key: &str| lookup(key).ok_or_else(|| MailerError::MissingEnvVar(key.to_string()));

        let smtp_host = required("SMTP_HOST")?;

        let smtp_port = match lookup("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| MailerError::Config(format!("Invalid SMTP_PORT: {}", e)))?,
            None => DEFAULT_SMTP_PORT,
        };

        let username = required("SMTP_USERNAME")?;
        let password = required("SMTP_PASSWORD")?;

        let mut config = Self::new(smtp_host, smtp_port, username, password);
        if let Some(from) = lookup("EMAIL_FROM").filter(|from| !from.trim().is_empty()) {
            config.from = from;
        }

        Ok(config)
    }

    /// Get the password (exposes the secret).
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Builder method to set the sender mailbox.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Builder method to override the TLS mode.
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }
}
