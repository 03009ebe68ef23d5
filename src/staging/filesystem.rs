//! Filesystem-based staging store.
//!
//! Object keys map to paths under a base directory:
//! ```text
//! {base_path}/
//!   unprocessed/
//!     2024-01-31T12:00:00Z__{uuid}__2__inserted_or_modified_records.json
//!   processed/
//! ```
//!
//! Puts write a hidden temp file and rename it into place, so `list` never
//! sees a partial object.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Result, StagingError, StagingStore};

/// Filesystem-based staging store.
pub struct FilesystemStagingStore {
    base_path: PathBuf,
}

impl FilesystemStagingStore {
    /// Create a new filesystem staging store.
    ///
    /// Creates the base directory if it doesn't exist.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Get the file path for an object key.
    fn path_for_key(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn is_hidden(name: &str) -> bool {
        name.starts_with('.')
    }
}

#[async_trait]
impl StagingStore for FilesystemStagingStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.path_for_key(key);
        let parent = path.parent().ok_or_else(|| StagingError::PutFailed {
            key: key.to_string(),
            reason: "key has no parent directory".to_string(),
        })?;
        fs::create_dir_all(parent).await?;

        // Write atomically using hidden temp file + rename
        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&temp_path, &body).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(key = %key, size = body.len(), "Stored staged object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.path_for_key(key)).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StagingError::NotFound(key.to_string()))
            }
            Err(e) => Err(StagingError::GetFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.path_for_key(key)).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path_for_key(prefix);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StagingError::ListFailed {
                    prefix: prefix.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if Self::is_hidden(&name) {
                continue;
            }
            keys.push(format!("{}{}", prefix, name));
        }
        keys.sort();
        Ok(keys)
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        let copy_failed = |reason: String| StagingError::CopyFailed {
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };

        let body = match fs::read(self.path_for_key(from)).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StagingError::NotFound(from.to_string()))
            }
            Err(e) => return Err(copy_failed(e.to_string())),
        };
        self.put(to, body)
            .await
            .map_err(|e| copy_failed(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for_key(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StagingError::NotFound(key.to_string()))
            }
            Err(e) => Err(StagingError::DeleteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn delete_older_than(&self, prefix: &str, age: Duration) -> Result<usize> {
        let cutoff = SystemTime::now() - age;
        let mut deleted = 0;

        for key in self.list(prefix).await? {
            let path = self.path_for_key(&key);
            let metadata = fs::metadata(&path).await?;
            if let Ok(modified) = metadata.modified() {
                if modified < cutoff {
                    if let Err(e) = fs::remove_file(&path).await {
                        warn!(key = %key, error = %e, "Failed to delete expired staged object");
                    } else {
                        deleted += 1;
                    }
                }
            }
        }

        Ok(deleted)
    }

    fn uri(&self, key: &str) -> String {
        format!("file://{}", self.path_for_key(key).display())
    }

    fn storage_type(&self) -> &'static str {
        "filesystem"
    }
}
