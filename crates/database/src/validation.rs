//! Input validation for user and client fields.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Password does not meet the minimum requirements.
    WeakPassword(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::WeakPassword(msg) => write!(f, "Password {}", msg),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} is required", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum allowed length for short text fields (names, phone numbers).
pub const MAX_TEXT_LENGTH: usize = 200;

/// Maximum allowed length for free-form notes and addresses.
pub const MAX_NOTES_LENGTH: usize = 5000;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (bounds hashing cost).
pub const MAX_PASSWORD_LENGTH: usize = 256;

/// Validate an email address (basic `local@domain.tld` check).
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let invalid = |msg: &str| Err(ValidationError::InvalidEmail(msg.to_string()));

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }
    check_length("email", email, MAX_EMAIL_LENGTH)?;

    let Some((local, domain)) = email.split_once('@') else {
        return invalid("must contain an @ symbol");
    };

    if domain.contains('@') {
        return invalid("must contain exactly one @ symbol");
    }
    if local.is_empty() {
        return invalid("missing local part (before @)");
    }
    if domain.is_empty() {
        return invalid("missing domain (after @)");
    }
    if !domain.contains('.') {
        return invalid("domain must contain at least one dot");
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return invalid("domain cannot start or end with a dot");
    }
    if domain.contains("..") {
        return invalid("domain cannot contain consecutive dots");
    }
    if email.chars().any(char::is_whitespace) {
        return invalid("cannot contain whitespace");
    }

    Ok(())
}

/// Validate a required text field and return it trimmed.
pub fn validate_required<'a>(field: &str, value: Option<&'a str>, max: usize) -> Result<&'a str, ValidationError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }
    check_length(field, value, max)?;
    Ok(value)
}

/// Validate an optional text field. Blank values are normalised to `None`.
pub fn validate_optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => {
            check_length(field, value, max)?;
            Ok(Some(value.to_string()))
        }
    }
}

/// Validate a clearable update field. Absent stays absent; `null` and
/// blank strings both clear.
pub fn validate_nullable(
    field: &str,
    value: Option<Option<String>>,
    max: usize,
) -> Result<Option<Option<String>>, ValidationError> {
    value
        .map(|inner| validate_optional(field, inner.as_deref(), max))
        .transpose()
}

/// Validate a new password.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::Empty("password".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::WeakPassword(format!(
            "must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    check_length("password", password, MAX_PASSWORD_LENGTH)
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}
