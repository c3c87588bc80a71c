//! Registration, email verification, sessions and profiles.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use database::validation::{
    validate_email, validate_nullable, validate_password, validate_required, MAX_TEXT_LENGTH,
};
use database::{NewUser, Session, User, UserUpdate};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::branding::{find_theme, Branding};
use crate::email::verification_email;
use crate::error::{InvoicingError, Result};
use crate::mail::MailDispatch;
use crate::storage::{Bucket, ObjectStore, SignedUpload};
use crate::store::Store;

/// How long a verification link stays valid.
pub const VERIFICATION_TTL_HOURS: i64 = 24;

/// Default lifetime of a login session.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 720;

const TOKEN_BYTES: usize = 32;

/// A fresh random token, hex encoded.
pub(crate) fn random_token() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.random::<u8>()).collect();
    hex::encode(bytes)
}

/// SHA-256 digest of a bearer token, as stored.
pub(crate) fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut rng = rand::rng();
        let salt_bytes: Vec<u8> = (0..16).map(|_| rng.random::<u8>()).collect();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| InvoicingError::PasswordHash(e.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| InvoicingError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| InvoicingError::PasswordHash(e.to_string()))?
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = match PasswordHash::new(&hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is not a valid PHC string");
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| InvoicingError::PasswordHash(e.to_string()))
}

/// Body of a registration request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Body of a login request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// A freshly issued session token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Body of a profile upload request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUploadRequest {
    pub filename: Option<String>,
    pub folder: Option<String>,
}

/// Tunables for [`AccountService`].
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Base URL links in emails point at.
    pub public_url: String,
    pub session_ttl: Duration,
    pub verification_ttl: Duration,
}

impl AccountSettings {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            verification_ttl: Duration::hours(VERIFICATION_TTL_HOURS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

/// User accounts and sessions.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    mail: Arc<dyn MailDispatch>,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        objects: Arc<dyn ObjectStore>,
        mail: Arc<dyn MailDispatch>,
        settings: AccountSettings,
    ) -> Self {
        Self {
            store,
            objects,
            mail,
            settings,
        }
    }

    /// Create an unverified account and email its verification link.
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        let email = normalize_email(request.email.as_deref())?;
        let password = request.password.unwrap_or_default();
        validate_password(&password)?;
        let name = validate_required("name", request.name.as_deref(), MAX_TEXT_LENGTH)?.to_string();

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(InvoicingError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let token = random_token();
        let user = self
            .store
            .create_user(&NewUser {
                email,
                password_hash: hash_password(password).await?,
                name: Some(name),
                verification_token: Some(token.clone()),
                verification_expires_at: Some(Utc::now() + self.settings.verification_ttl),
            })
            .await?;

        let url = format!("{}/verify-email?token={}", self.settings.public_url, token);
        let greeting = user.name.as_deref().unwrap_or(&user.email);
        let email = verification_email(&user.email, greeting, &url, &Branding::default())?;
        self.mail.send(&email).await?;

        info!(user_id = %user.id, "Registered user, verification email sent");
        Ok(user)
    }

    /// Consume a verification token.
    pub async fn verify_email(&self, token: Option<&str>) -> Result<User> {
        let token = token.map(str::trim).unwrap_or_default();
        if token.is_empty() {
            return Err(InvoicingError::validation("verification token is required"));
        }

        let user = self
            .store
            .verify_email_token(token, Utc::now())
            .await?
            .ok_or(InvoicingError::InvalidToken)?;

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    /// Check credentials and open a session.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let email = request
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .unwrap_or_default();
        let password = request.password.unwrap_or_default();
        if email.is_empty() || password.is_empty() {
            return Err(InvoicingError::validation("email and password are required"));
        }

        let user = self
            .store
            .get_user_by_email(&email)
            .await?
            .ok_or(InvoicingError::InvalidCredentials)?;
        if !verify_password(password, user.password_hash.clone()).await? {
            return Err(InvoicingError::InvalidCredentials);
        }
        if !user.is_verified() {
            return Err(InvoicingError::EmailNotVerified);
        }

        let token = random_token();
        let now = Utc::now();
        let session = Session {
            token_hash: token_digest(&token),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + self.settings.session_ttl,
        };
        self.store.create_session(&session).await?;

        let pruned = self.store.delete_expired_sessions(now).await?;
        if pruned > 0 {
            info!(pruned, "Removed expired sessions");
        }

        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            token,
            expires_at: session.expires_at,
            user,
        })
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let digest = token_digest(token);
        let session = self
            .store
            .get_session(&digest)
            .await?
            .ok_or(InvoicingError::Unauthenticated)?;

        if session.is_expired(Utc::now()) {
            self.store.delete_session(&digest).await?;
            return Err(InvoicingError::Unauthenticated);
        }

        self.store
            .get_user_by_id(&session.user_id)
            .await?
            .ok_or(InvoicingError::Unauthenticated)
    }

    /// Drop a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if self.store.delete_session(&token_digest(token)).await? {
            info!("Session closed");
        }
        Ok(())
    }

    pub async fn profile(&self, user_id: &str) -> Result<User> {
        self.store
            .get_user_by_id(user_id)
            .await?
            .ok_or(InvoicingError::not_found("User"))
    }

    /// Update profile and branding fields. `null` clears a field; the
    /// display name can be changed but not cleared.
    pub async fn update_profile(&self, user_id: &str, update: UserUpdate) -> Result<User> {
        let mut update = update;
        if let Some(theme) = update.brand_theme.as_ref().and_then(|t| t.as_deref()) {
            if find_theme(theme).is_none() {
                return Err(InvoicingError::validation(format!("unknown brand theme: {theme}")));
            }
        }
        if let Some(name) = update.name.take() {
            let name = validate_required("name", name.as_deref(), MAX_TEXT_LENGTH)?;
            update.name = Some(Some(name.to_string()));
        }
        update.first_name = validate_nullable("firstName", update.first_name.take(), MAX_TEXT_LENGTH)?;
        update.last_name = validate_nullable("lastName", update.last_name.take(), MAX_TEXT_LENGTH)?;
        update.company = validate_nullable("company", update.company.take(), MAX_TEXT_LENGTH)?;
        update.designation =
            validate_nullable("designation", update.designation.take(), MAX_TEXT_LENGTH)?;
        update.department =
            validate_nullable("department", update.department.take(), MAX_TEXT_LENGTH)?;
        update.profile_picture_url =
            validate_nullable("profilePictureUrl", update.profile_picture_url.take(), 2048)?;
        update.company_logo_url =
            validate_nullable("companyLogoUrl", update.company_logo_url.take(), 2048)?;

        Ok(self.store.update_user(user_id, &update).await?)
    }

    /// Signed upload URL for the user's avatar or company logo.
    pub async fn profile_upload_url(
        &self,
        user_id: &str,
        request: ProfileUploadRequest,
    ) -> Result<SignedUpload> {
        let (bucket, stem) = match request.folder.as_deref() {
            Some("avatars") => (Bucket::Avatars, "avatar"),
            Some("logos") => (Bucket::Logos, "logo"),
            _ => return Err(InvoicingError::validation("folder must be avatars or logos")),
        };
        let extension = request
            .filename
            .as_deref()
            .and_then(file_extension)
            .ok_or_else(|| InvoicingError::validation("filename must have an extension"))?;

        let key = format!("{user_id}/{stem}.{extension}");
        Ok(self.objects.create_signed_upload_url(bucket, &key)?)
    }
}

fn normalize_email(email: Option<&str>) -> Result<String> {
    let email = email.map(|e| e.trim().to_lowercase()).unwrap_or_default();
    validate_email(&email)?;
    Ok(email)
}

/// Lowercase alphanumeric extension of a file name.
fn file_extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;
    let extension: String = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(10)
        .collect();
    (!extension.is_empty()).then_some(extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::RecordingDispatch;
    use crate::storage::{MemoryObjectStore, UrlSigner};
    use crate::store::MemoryStore;

    struct Harness {
        accounts: AccountService,
        store: MemoryStore,
        mail: RecordingDispatch,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let mail = RecordingDispatch::new();
        let objects = MemoryObjectStore::new(UrlSigner::new(
            "http://localhost:3000",
            "test-secret",
            Duration::hours(2),
        ));
        let accounts = AccountService::new(
            Arc::new(store.clone()),
            Arc::new(objects),
            Arc::new(mail.clone()),
            AccountSettings::new("http://localhost:3000/"),
        );
        Harness {
            accounts,
            store,
            mail,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Alice".to_string()),
            email: Some(email.to_string()),
            password: Some("correct horse".to_string()),
        }
    }

    async fn sent_token(mail: &RecordingDispatch) -> String {
        let sent = mail.sent().await;
        let body = &sent.last().unwrap().body;
        let start = body.find("token=").unwrap() + "token=".len();
        body[start..start + TOKEN_BYTES * 2].to_string()
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_tokens() {
        let token = random_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, random_token());
        assert_eq!(token_digest("abc").len(), 64);
        assert_eq!(token_digest("abc"), token_digest("abc"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("me.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("../../x.j/p g").as_deref(), Some("jpg"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[tokio::test]
    async fn test_register_sends_verification_email() {
        let h = harness();
        let user = h.accounts.register(register_request(" Alice@Example.com ")).await.unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(!user.is_verified());
        assert_ne!(user.password_hash, "correct horse");

        let sent = h.mail.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["alice@example.com".to_string()]);
        assert!(sent[0].body.contains("http://localhost:3000/verify-email?token="));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let h = harness();

        let mut request = register_request("alice@example.com");
        request.password = Some("short".to_string());
        assert!(matches!(
            h.accounts.register(request).await,
            Err(InvoicingError::Validation(_))
        ));

        assert!(matches!(
            h.accounts.register(register_request("not-an-email")).await,
            Err(InvoicingError::Validation(_))
        ));

        for name in [None, Some("   ".to_string())] {
            let mut request = register_request("alice@example.com");
            request.name = name;
            let err = h.accounts.register(request).await.unwrap_err();
            assert!(err.to_string().contains("name"), "{err}");
        }

        assert!(h.store.get_user_by_email("alice@example.com").await.unwrap().is_none());
        assert!(h.mail.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let h = harness();
        h.accounts.register(register_request("alice@example.com")).await.unwrap();

        let err = h
            .accounts
            .register(register_request("ALICE@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let h = harness();
        h.accounts.register(register_request("alice@example.com")).await.unwrap();
        let token = sent_token(&h.mail).await;

        let user = h.accounts.verify_email(Some(&token)).await.unwrap();
        assert!(user.is_verified());

        assert!(matches!(
            h.accounts.verify_email(Some(&token)).await,
            Err(InvoicingError::InvalidToken)
        ));
        assert!(matches!(
            h.accounts.verify_email(None).await,
            Err(InvoicingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_requires_verified_email() {
        let h = harness();
        h.accounts.register(register_request("alice@example.com")).await.unwrap();

        assert!(matches!(
            h.accounts.login(login_request("alice@example.com", "correct horse")).await,
            Err(InvoicingError::EmailNotVerified)
        ));

        let token = sent_token(&h.mail).await;
        h.accounts.verify_email(Some(&token)).await.unwrap();

        assert!(matches!(
            h.accounts.login(login_request("alice@example.com", "wrong password")).await,
            Err(InvoicingError::InvalidCredentials)
        ));
        assert!(matches!(
            h.accounts.login(login_request("nobody@example.com", "correct horse")).await,
            Err(InvoicingError::InvalidCredentials)
        ));

        let login = h
            .accounts
            .login(login_request("alice@example.com", "correct horse"))
            .await
            .unwrap();
        let user = h.accounts.authenticate(&login.token).await.unwrap();
        assert_eq!(user.id, login.user.id);

        h.accounts.logout(&login.token).await.unwrap();
        assert!(matches!(
            h.accounts.authenticate(&login.token).await,
            Err(InvoicingError::Unauthenticated)
        ));
        // Logging out twice is fine.
        h.accounts.logout(&login.token).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped() {
        let h = harness();
        let user = h.accounts.register(register_request("alice@example.com")).await.unwrap();

        let token = random_token();
        let now = Utc::now();
        h.store
            .create_session(&Session {
                token_hash: token_digest(&token),
                user_id: user.id.clone(),
                created_at: now - Duration::hours(2),
                expires_at: now - Duration::hours(1),
            })
            .await
            .unwrap();

        assert!(matches!(
            h.accounts.authenticate(&token).await,
            Err(InvoicingError::Unauthenticated)
        ));
        assert!(h.store.get_session(&token_digest(&token)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_prunes_expired_sessions() {
        let h = harness();
        let user = h.accounts.register(register_request("alice@example.com")).await.unwrap();
        let token = sent_token(&h.mail).await;
        h.accounts.verify_email(Some(&token)).await.unwrap();

        let now = Utc::now();
        let abandoned = Session {
            token_hash: token_digest("abandoned"),
            user_id: user.id.clone(),
            created_at: now - Duration::days(40),
            expires_at: now - Duration::days(10),
        };
        h.store.create_session(&abandoned).await.unwrap();

        let login = h
            .accounts
            .login(login_request("alice@example.com", "correct horse"))
            .await
            .unwrap();

        assert!(h.store.get_session(&abandoned.token_hash).await.unwrap().is_none());
        assert!(h.store.get_session(&token_digest(&login.token)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_profile_validates_theme() {
        let h = harness();
        let user = h.accounts.register(register_request("alice@example.com")).await.unwrap();

        let err = h
            .accounts
            .update_profile(
                &user.id,
                UserUpdate {
                    brand_theme: Some(Some("neon-pink".to_string())),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));

        let updated = h
            .accounts
            .update_profile(
                &user.id,
                UserUpdate {
                    brand_theme: Some(Some("nature-green".to_string())),
                    company: Some(Some("Alice Design Ltd".to_string())),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.brand_theme.as_deref(), Some("nature-green"));
        assert_eq!(updated.company.as_deref(), Some("Alice Design Ltd"));
        assert_eq!(updated.name.as_deref(), Some("Alice"));

        let clear: UserUpdate =
            serde_json::from_str(r#"{"company": null, "brandTheme": null}"#).unwrap();
        let cleared = h.accounts.update_profile(&user.id, clear).await.unwrap();
        assert_eq!(cleared.company, None);
        assert_eq!(cleared.brand_theme, None);
        assert_eq!(Branding::for_user(&cleared).theme.id, "modern-orange");

        let err = h
            .accounts
            .update_profile(&user.id, serde_json::from_str(r#"{"name": null}"#).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));
    }

    #[tokio::test]
    async fn test_profile_upload_url() {
        let h = harness();

        let upload = h
            .accounts
            .profile_upload_url(
                "user-1",
                ProfileUploadRequest {
                    filename: Some("Me.JPG".to_string()),
                    folder: Some("avatars".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(upload.bucket, Bucket::Avatars);
        assert_eq!(upload.path, "user-1/avatar.jpg");
        assert!(upload
            .signed_url
            .starts_with("http://localhost:3000/storage/avatars/user-1/avatar.jpg?expires="));

        let err = h
            .accounts
            .profile_upload_url(
                "user-1",
                ProfileUploadRequest {
                    filename: Some("logo.png".to_string()),
                    folder: Some("invoice-attachments".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InvoicingError::Validation(_)));
    }
}
