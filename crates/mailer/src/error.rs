use thiserror::Error;

/// Errors raised while configuring the relay or delivering a message.
#[derive(Debug, Error)]
pub enum MailerError {
    #[error("cannot set up SMTP relay: {0}")]
    Transport(String),

    /// The relay refused the message or the connection failed mid-send.
    #[error("SMTP delivery failed: {0}")]
    Delivery(String),

    #[error("invalid {field} address {address:?}: {reason}")]
    InvalidAddress {
        field: &'static str,
        address: String,
        reason: String,
    },

    #[error("cannot build message: {0}")]
    Message(String),

    #[error("{0} is not set")]
    MissingEnvVar(String),

    #[error("invalid mail setting: {0}")]
    Config(String),
}
