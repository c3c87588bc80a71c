//! Object storage for invoice PDFs, avatars and logos.
//!
//! Objects are addressed by a [`Bucket`] and a relative key such as
//! `<user>/avatar.png`. Public and signed upload URLs are served by the web
//! crate under `/storage/<bucket>/<key>`.

mod local;
mod memory;
mod signing;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use signing::{SignedUpload, UrlSigner};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    Avatars,
    Logos,
    InvoiceAttachments,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Avatars => "avatars",
            Bucket::Logos => "logos",
            Bucket::InvoiceAttachments => "invoice-attachments",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatars" => Ok(Bucket::Avatars),
            "logos" => Ok(Bucket::Logos),
            "invoice-attachments" => Ok(Bucket::InvoiceAttachments),
            other => Err(StorageError::UnknownBucket(other.to_string())),
        }
    }
}

/// Errors returned by an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: Bucket, key: String },

    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("invalid upload signature")]
    InvalidSignature,

    #[error("upload URL expired")]
    Expired,

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Check that a key is a relative path without traversal.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = || Err(StorageError::InvalidKey(key.to_string()));

    if key.is_empty() || key.len() > 512 || key.starts_with('/') || key.contains('\\') {
        return invalid();
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return invalid();
        }
        if segment.chars().any(char::is_control) {
            return invalid();
        }
    }
    Ok(())
}

/// Object storage contract.
///
/// Implementors only provide raw byte operations and a [`UrlSigner`]; URL
/// construction and signature checks are shared.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one.
    async fn upload(&self, bucket: Bucket, key: &str, data: &[u8], content_type: &str) -> StorageResult<()>;

    /// Read an object.
    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove an object. Removing a missing object is not an error.
    async fn remove(&self, bucket: Bucket, key: &str) -> StorageResult<()>;

    /// URL builder and signer for this store.
    fn signer(&self) -> &UrlSigner;

    /// Publicly retrievable URL of an object.
    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.signer().public_url(bucket, key)
    }

    /// URL a client can `PUT` the object to until it expires.
    fn create_signed_upload_url(&self, bucket: Bucket, key: &str) -> StorageResult<SignedUpload> {
        validate_key(key)?;
        self.signer().sign_upload(bucket, key, Utc::now())
    }

    /// Check a signed upload before accepting its body.
    fn verify_signed_upload(
        &self,
        bucket: Bucket,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        validate_key(key)?;
        self.signer().verify(bucket, key, expires, signature, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_names() {
        for bucket in [Bucket::Avatars, Bucket::Logos, Bucket::InvoiceAttachments] {
            assert_eq!(bucket.as_str().parse::<Bucket>().unwrap(), bucket);
        }
        assert!(matches!(
            "secrets".parse::<Bucket>(),
            Err(StorageError::UnknownBucket(_))
        ));
    }

    #[test]
    fn test_key_validation() {
        assert!(validate_key("user-1/avatar.png").is_ok());
        assert!(validate_key("user-1/invoice-INV-00001-1718000000000.pdf").is_ok());

        for key in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a\\b", "a/./b", "a/"] {
            assert!(validate_key(key).is_err(), "{key:?} should be rejected");
        }
    }
}
