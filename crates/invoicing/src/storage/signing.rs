use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{Bucket, StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// A time-limited URL a client can upload one object to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUpload {
    pub signed_url: String,
    pub bucket: Bucket,
    /// Object key, needed by the client to build the public URL.
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

/// Builds public URLs and signs upload URLs for a storage backend.
///
/// Signatures are `HMAC-SHA256(secret, bucket/key \0 expiry)` in hex; the
/// expiry is a unix timestamp carried in the URL.
#[derive(Debug, Clone)]
pub struct UrlSigner {
    base_url: String,
    secret: SecretString,
    ttl: Duration,
}

impl UrlSigner {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: SecretString::from(secret.into()),
            ttl,
        }
    }

    pub fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/storage/{}/{}", self.base_url, bucket, key)
    }

    pub(crate) fn sign_upload(
        &self,
        bucket: Bucket,
        key: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<SignedUpload> {
        let expires_at = now + self.ttl;
        let expires = expires_at.timestamp();
        let signature = hex::encode(self.mac(bucket, key, expires)?.finalize().into_bytes());

        Ok(SignedUpload {
            signed_url: format!(
                "{}?expires={}&signature={}",
                self.public_url(bucket, key),
                expires,
                signature
            ),
            bucket,
            path: key.to_string(),
            expires_at,
        })
    }

    pub(crate) fn verify(
        &self,
        bucket: Bucket,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        let provided = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        let expected = self.mac(bucket, key, expires)?.finalize().into_bytes();
        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return Err(StorageError::InvalidSignature);
        }
        if now.timestamp() >= expires {
            return Err(StorageError::Expired);
        }
        Ok(())
    }

    fn mac(&self, bucket: Bucket, key: &str, expires: i64) -> StorageResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| StorageError::Backend(format!("signing key rejected: {e}")))?;
        mac.update(bucket.as_str().as_bytes());
        mac.update(b"/");
        mac.update(key.as_bytes());
        mac.update(&[0u8]);
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("http://localhost:3000/", "s3cret", Duration::hours(2))
    }

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        url.split(['?', '&'])
            .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
            .unwrap()
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            signer().public_url(Bucket::Logos, "u1/logo.png"),
            "http://localhost:3000/storage/logos/u1/logo.png"
        );
    }

    #[test]
    fn test_signed_upload_round_trip() {
        let signer = signer();
        let now = Utc::now();
        let upload = signer.sign_upload(Bucket::Avatars, "u1/avatar.png", now).unwrap();

        assert!(upload
            .signed_url
            .starts_with("http://localhost:3000/storage/avatars/u1/avatar.png?expires="));
        let expires: i64 = query_param(&upload.signed_url, "expires").parse().unwrap();
        let signature = query_param(&upload.signed_url, "signature");
        assert_eq!(expires, upload.expires_at.timestamp());

        assert!(signer
            .verify(Bucket::Avatars, "u1/avatar.png", expires, signature, now)
            .is_ok());

        // Signature is bound to bucket, key and expiry.
        assert!(matches!(
            signer.verify(Bucket::Logos, "u1/avatar.png", expires, signature, now),
            Err(StorageError::InvalidSignature)
        ));
        assert!(matches!(
            signer.verify(Bucket::Avatars, "u2/avatar.png", expires, signature, now),
            Err(StorageError::InvalidSignature)
        ));
        assert!(matches!(
            signer.verify(Bucket::Avatars, "u1/avatar.png", expires + 60, signature, now),
            Err(StorageError::InvalidSignature)
        ));

        let later = now + Duration::hours(3);
        assert!(matches!(
            signer.verify(Bucket::Avatars, "u1/avatar.png", expires, signature, later),
            Err(StorageError::Expired)
        ));
    }

    #[test]
    fn test_other_secret_rejects() {
        let now = Utc::now();
        let upload = signer().sign_upload(Bucket::Avatars, "u1/avatar.png", now).unwrap();
        let other = UrlSigner::new("http://localhost:3000", "different", Duration::hours(2));

        let expires = upload.expires_at.timestamp();
        let signature = query_param(&upload.signed_url, "signature");
        assert!(other
            .verify(Bucket::Avatars, "u1/avatar.png", expires, signature, now)
            .is_err());
    }

    #[test]
    fn test_tampered_signature_rejects() {
        let signer = signer();
        let now = Utc::now();
        let upload = signer.sign_upload(Bucket::Logos, "u1/logo.png", now).unwrap();
        let expires = upload.expires_at.timestamp();
        let signature = query_param(&upload.signed_url, "signature");
        assert_eq!(signature.len(), 64);

        // Flip the last hex digit.
        let mut tampered = signature[..63].to_string();
        tampered.push(if signature.ends_with('0') { '1' } else { '0' });

        for bad in [tampered.as_str(), &signature[..62], "", "not-hex"] {
            assert!(
                matches!(
                    signer.verify(Bucket::Logos, "u1/logo.png", expires, bad, now),
                    Err(StorageError::InvalidSignature)
                ),
                "{bad:?}"
            );
        }

        // Hex case does not matter once decoded.
        let upper = signature.to_uppercase();
        assert!(signer.verify(Bucket::Logos, "u1/logo.png", expires, &upper, now).is_ok());
    }

    #[test]
    fn test_signature_is_keyed_hmac() {
        let upload = signer()
            .sign_upload(Bucket::Avatars, "u1/avatar.png", DateTime::from_timestamp(0, 0).unwrap())
            .unwrap();
        let signature = query_param(&upload.signed_url, "signature");

        let mut mac = HmacSha256::new_from_slice(b"s3cret").unwrap();
        mac.update(b"avatars/u1/avatar.png\0");
        mac.update(upload.expires_at.timestamp().to_string().as_bytes());
        assert_eq!(signature, hex::encode(mac.finalize().into_bytes()));
    }
}
