use lettre::{
    message::{header::ContentType, Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info, instrument};

use crate::{Email, MailerConfig, MailerError, TlsMode};

/// Client for sending emails through an SMTP relay.
///
/// Uses connection pooling so consecutive sends reuse the session.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Create a new client with the given configuration.
    ///
    /// No connection is opened until the first send.
    pub fn new(config: MailerConfig) -> Result<Self, MailerError> {
        let from = parse_mailbox("From", &config.from)?;
        let creds = Credentials::new(config.username.clone(), config.password().to_string());

        let builder = match config.tls {
            TlsMode::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host),
        }
        .map_err(|e| MailerError::Transport(e.to_string()))?;

        let transport = builder.port(config.smtp_port).credentials(creds).build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = ?config.tls,
            from = %from,
            "Created SMTP client"
        );

        Ok(Self { transport, from })
    }

    /// Send an email. Returns once the relay has accepted the message.
    #[instrument(skip(self, email), fields(to = ?email.to, subject = %email.subject))]
    pub async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let message = build_message(&self.from, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailerError::Delivery(e.to_string()))?;

        info!(to = ?email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

fn parse_mailbox(field: &'static str, raw: &str) -> Result<Mailbox, MailerError> {
    raw.parse().map_err(|e: lettre::address::AddressError| MailerError::InvalidAddress {
        field,
        address: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Build a lettre Message from our Email type.
pub(crate) fn build_message(from: &Mailbox, email: &Email) -> Result<Message, MailerError> {
    let mut builder = Message::builder().from(from.clone()).subject(&email.subject);

    for to in &email.to {
        builder = builder.to(parse_mailbox("To", to)?);
    }

    let body = match &email.html_body {
        Some(html) => MultiPart::alternative()
            .singlepart(SinglePart::plain(email.body.clone()))
            .singlepart(SinglePart::html(html.clone())),
        None => MultiPart::alternative().singlepart(SinglePart::plain(email.body.clone())),
    };

    let message = if email.attachments.is_empty() {
        builder.multipart(body)
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);

        for attachment in &email.attachments {
            debug!(
                filename = %attachment.filename,
                content_type = %attachment.content_type,
                size = attachment.data.len(),
                "Adding attachment"
            );

            let content_type: ContentType = attachment
                .content_type
                .parse()
                .map_err(|e| MailerError::Message(format!("content type of {}: {e}", attachment.filename)))?;

            mixed = mixed.singlepart(
                LettreAttachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }

        builder.multipart(mixed)
    };

    message.map_err(|e| MailerError::Message(e.to_string()))
}
