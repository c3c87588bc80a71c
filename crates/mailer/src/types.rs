/// An outgoing message: plain text, optionally with an HTML alternative and
/// attachments.
#[derive(Debug, Clone, Default)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    /// Plain text part, always sent.
    pub body: String,
    pub html_body: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Add an HTML alternative to the text body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A file sent along with an [`Email`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// A PDF document.
    pub fn pdf(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(filename, "application/pdf", data)
    }
}
