use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{validate_key, Bucket, ObjectStore, StorageError, StorageResult, UrlSigner};

/// Object store on the local filesystem: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: Bucket, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(bucket.as_str()).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, bucket: Bucket, key: &str, data: &[u8], content_type: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let tmp = path.with_extension(format!("upload-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(%bucket, key, size = data.len(), content_type, "Stored object");
        Ok(())
    }

    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket,
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%bucket, key, "Removed object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn signer(&self) -> &UrlSigner {
        &self.signer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store(dir: &tempfile::TempDir) -> LocalObjectStore {
        let signer = UrlSigner::new("http://localhost:3000", "secret", Duration::hours(2));
        LocalObjectStore::new(dir.path(), signer)
    }

    #[tokio::test]
    async fn test_upload_download_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        store
            .upload(Bucket::Logos, "u1/logo.png", b"png-bytes", "image/png")
            .await
            .unwrap();
        assert!(dir.path().join("logos/u1/logo.png").exists());
        assert_eq!(
            store.download(Bucket::Logos, "u1/logo.png").await.unwrap(),
            b"png-bytes"
        );

        // Overwrite
        store
            .upload(Bucket::Logos, "u1/logo.png", b"v2", "image/png")
            .await
            .unwrap();
        assert_eq!(store.download(Bucket::Logos, "u1/logo.png").await.unwrap(), b"v2");

        store.remove(Bucket::Logos, "u1/logo.png").await.unwrap();
        assert!(matches!(
            store.download(Bucket::Logos, "u1/logo.png").await,
            Err(StorageError::NotFound { .. })
        ));

        // Idempotent
        store.remove(Bucket::Logos, "u1/logo.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);

        let result = store
            .upload(Bucket::Avatars, "../escape.txt", b"x", "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
