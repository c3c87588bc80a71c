//! Invoice number sequence.
//!
//! Invoice numbers are rendered as `INV-` followed by the sequence value
//! zero-padded to five digits (`INV-00001`). Allocation is done through a
//! per-user counter row that is bumped in the same transaction as the
//! invoice insert, so two concurrent creations can never observe the same
//! value. A user without a counter row (e.g. imported data) is seeded from
//! their most recent invoice number.

use std::fmt;
use std::str::FromStr;

use sqlx::SqliteConnection;
use thiserror::Error;

use crate::error::Result;

/// Prefix of every invoice number.
pub const INVOICE_PREFIX: &str = "INV-";

/// Minimum number of digits after the prefix.
pub const INVOICE_DIGITS: usize = 5;

/// Errors raised while deriving an invoice number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberingError {
    /// The stored number does not follow `INV-<digits>`.
    #[error("malformed invoice number: {0:?}")]
    Malformed(String),

    /// The sequence cannot be incremented any further.
    #[error("invoice number sequence exhausted")]
    Exhausted,
}

/// A parsed invoice number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvoiceNumber(u32);

impl InvoiceNumber {
    /// The first number handed out to a user.
    pub const FIRST: InvoiceNumber = InvoiceNumber(1);

    /// Wrap a raw sequence value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// The numeric sequence value.
    pub fn value(self) -> u32 {
        self.0
    }

    /// The number following this one.
    pub fn next(self) -> std::result::Result<Self, NumberingError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(NumberingError::Exhausted)
    }

    /// The number that follows the most recent one, or `INV-00001` when
    /// there is none.
    pub fn after(latest: Option<&str>) -> std::result::Result<Self, NumberingError> {
        match latest {
            None => Ok(Self::FIRST),
            Some(raw) => raw.parse::<InvoiceNumber>()?.next(),
        }
    }
}

impl FromStr for InvoiceNumber {
    type Err = NumberingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let malformed = || NumberingError::Malformed(s.to_string());

        let digits = s.strip_prefix(INVOICE_PREFIX).ok_or_else(malformed)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        digits.parse::<u32>().map(Self).map_err(|_| malformed())
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:0width$}", INVOICE_PREFIX, self.0, width = INVOICE_DIGITS)
    }
}

/// Most recent invoice number for a user, newest first by creation time.
pub async fn latest_invoice_number(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<String>> {
    let latest = sqlx::query_scalar::<_, String>(
        r#"
        SELECT invoice_number
        FROM invoices
        WHERE user_id = ?
        ORDER BY created_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;

    Ok(latest)
}

/// The number the next allocation would return, without reserving it.
pub async fn peek_next(conn: &mut SqliteConnection, user_id: &str) -> Result<InvoiceNumber> {
    let counter = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT last_number FROM invoice_counters WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match counter {
        Some(last) => Ok(counter_value(last)?.next()?),
        None => {
            let latest = latest_invoice_number(conn, user_id).await?;
            Ok(InvoiceNumber::after(latest.as_deref())?)
        }
    }
}

/// Reserve the next invoice number for a user.
///
/// Must run inside the transaction that inserts the invoice. The counter
/// update is issued first so the write lock is taken before anything is read.
pub async fn allocate(conn: &mut SqliteConnection, user_id: &str) -> Result<InvoiceNumber> {
    let bumped = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE invoice_counters
        SET last_number = last_number + 1
        WHERE user_id = ?
        RETURNING last_number
        "#,
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(value) = bumped {
        return Ok(counter_value(value)?);
    }

    let latest = latest_invoice_number(&mut *conn, user_id).await?;
    let number = InvoiceNumber::after(latest.as_deref())?;

    sqlx::query(
        r#"
        INSERT INTO invoice_counters (user_id, last_number)
        VALUES (?, ?)
        "#,
    )
    .bind(user_id)
    .bind(i64::from(number.value()))
    .execute(conn)
    .await?;

    Ok(number)
}

fn counter_value(raw: i64) -> std::result::Result<InvoiceNumber, NumberingError> {
    u32::try_from(raw)
        .map(InvoiceNumber::new)
        .map_err(|_| NumberingError::Exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number() {
        assert_eq!(InvoiceNumber::after(None).unwrap().to_string(), "INV-00001");
    }

    #[test]
    fn test_increment_from_latest() {
        let next = InvoiceNumber::after(Some("INV-00042")).unwrap();
        assert_eq!(next.to_string(), "INV-00043");
    }

    #[test]
    fn test_grows_past_five_digits() {
        let next = InvoiceNumber::after(Some("INV-99999")).unwrap();
        assert_eq!(next.to_string(), "INV-100000");
        assert_eq!("INV-100000".parse::<InvoiceNumber>().unwrap(), next);
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        for raw in ["INV-", "INV-12a45", "FOO-00001", "00001", "INV--0001", "INV-99999999999"] {
            assert!(
                matches!(InvoiceNumber::after(Some(raw)), Err(NumberingError::Malformed(_))),
                "{raw} should be malformed"
            );
        }
    }

    #[test]
    fn test_exhausted_sequence() {
        assert_eq!(
            InvoiceNumber::new(u32::MAX).next(),
            Err(NumberingError::Exhausted)
        );
    }
}
