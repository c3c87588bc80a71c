use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{validate_key, Bucket, ObjectStore, StorageError, StorageResult, UrlSigner};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-memory object store for tests.
///
/// Uploads can be made to fail to exercise error paths.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<(Bucket, String), StoredObject>>>,
    fail_uploads: Arc<AtomicBool>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: Arc::default(),
            fail_uploads: Arc::default(),
            signer,
        }
    }

    /// Make every following upload fail.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, bucket: Bucket, key: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(bucket, key.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Content type recorded at upload.
    pub async fn content_type(&self, bucket: Bucket, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(bucket, key.to_string()))
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, bucket: Bucket, key: &str, data: &[u8], content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("upload rejected".to_string()));
        }
        self.objects.write().await.insert(
            (bucket, key.to_string()),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, bucket: Bucket, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(&(bucket, key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket,
                key: key.to_string(),
            })
    }

    async fn remove(&self, bucket: Bucket, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.remove(&(bucket, key.to_string()));
        Ok(())
    }

    fn signer(&self) -> &UrlSigner {
        &self.signer
    }
}
