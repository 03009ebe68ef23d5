//! Mock staging store for testing.
//!
//! Keeps objects in memory and can be told to fail individual operations,
//! which is how drain behaviour under partial failure is exercised.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Result, StagingError, StagingStore};

struct StoredObject {
    body: Vec<u8>,
    modified: SystemTime,
}

/// Mock staging store that stores objects in memory.
#[derive(Default)]
pub struct MockStagingStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    fail_on_put: RwLock<bool>,
    fail_on_list: RwLock<bool>,
    fail_on_copy: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    fail_on_exists: RwLock<bool>,
}

impl MockStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    pub async fn set_fail_on_list(&self, fail: bool) {
        *self.fail_on_list.write().await = fail;
    }

    pub async fn set_fail_on_copy(&self, fail: bool) {
        *self.fail_on_copy.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    pub async fn set_fail_on_exists(&self, fail: bool) {
        *self.fail_on_exists.write().await = fail;
    }

    /// Whether an object exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Number of stored objects across all prefixes.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Pretend an object was last modified `age` ago.
    pub async fn backdate(&self, key: &str, age: Duration) {
        if let Some(object) = self.objects.write().await.get_mut(key) {
            object.modified = SystemTime::now() - age;
        }
    }
}

#[async_trait]
impl StagingStore for MockStagingStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        if *self.fail_on_put.read().await {
            return Err(StagingError::PutFailed {
                key: key.to_string(),
                reason: "injected put failure".to_string(),
            });
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| StagingError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if *self.fail_on_exists.read().await {
            return Err(StagingError::GetFailed {
                key: key.to_string(),
                reason: "injected exists failure".to_string(),
            });
        }
        Ok(self.contains(key).await)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if *self.fail_on_list.read().await {
            return Err(StagingError::ListFailed {
                prefix: prefix.to_string(),
                reason: "injected list failure".to_string(),
            });
        }
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|key| {
                key.strip_prefix(prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        if *self.fail_on_copy.read().await {
            return Err(StagingError::CopyFailed {
                from: from.to_string(),
                to: to.to_string(),
                reason: "injected copy failure".to_string(),
            });
        }
        let mut objects = self.objects.write().await;
        let body = objects
            .get(from)
            .map(|object| object.body.clone())
            .ok_or_else(|| StagingError::NotFound(from.to_string()))?;
        objects.insert(
            to.to_string(),
            StoredObject {
                body,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if *self.fail_on_delete.read().await {
            return Err(StagingError::DeleteFailed {
                key: key.to_string(),
                reason: "injected delete failure".to_string(),
            });
        }
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StagingError::NotFound(key.to_string()))
    }

    async fn delete_older_than(&self, prefix: &str, age: Duration) -> Result<usize> {
        let cutoff = SystemTime::now() - age;
        let candidates = self.list(prefix).await?;

        let mut objects = self.objects.write().await;
        let mut deleted = 0;
        for key in candidates {
            if objects.get(&key).is_some_and(|o| o.modified < cutoff) {
                objects.remove(&key);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn uri(&self, key: &str) -> String {
        format!("mock://{}", key)
    }

    fn storage_type(&self) -> &'static str {
        "mock"
    }
}
