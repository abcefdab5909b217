//! Storage backends
//!
//! Attachment files live under a private root that the web server never
//! serves directly; downloads go through the lifecycle service. Keys are
//! collision-free: a fresh UUID per upload, grouped by upload month.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::sniff::file_extension;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Bytes written
    pub size: u64,
    /// SHA256 digest of the written content
    pub digest: String,
}

/// Storage trait - unified interface for attachment file backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store data under a key, creating parent groupings as needed
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredFile>;

    /// Retrieve data by key
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete data by key. A missing key is a no-op.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete data by key, failing with `NotFound` when the key is missing.
    async fn delete_strict(&self, key: &str) -> StorageResult<()>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Display URL for the key, if the backend exposes one. Private roots
    /// return `None`; files are served through the download operation.
    async fn url(&self, key: &str) -> StorageResult<Option<String>>;

    /// Get storage name for logging
    fn name(&self) -> &str;
}

/// Generate the storage key for an uploaded file:
/// `attachments/<YYYYMM>/<uuid><extension>`.
///
/// The key layout is part of the persisted record format; files written years
/// apart must remain addressable, so keep the layout (and this function's
/// name) stable.
pub fn attachment_upload_path(filename: &str) -> String {
    let month_directory = chrono::Utc::now().format("%Y%m");
    format!(
        "attachments/{}/{}{}",
        month_directory,
        Uuid::new_v4(),
        file_extension(filename)
    )
}

fn calculate_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Local filesystem storage rooted at a private directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a key to a full path under the private root.
    pub fn path(&self, key: &str) -> StorageResult<PathBuf> {
        // Prevent directory traversal
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidPath(key.to_string()));
        }

        Ok(self.root.join(key))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(skip(self, data), fields(storage = "local"))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredFile> {
        let path = self.path(key)?;
        self.ensure_parent(&path).await?;

        let digest = calculate_digest(&data);
        let size = data.len() as u64;

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(path = ?path, size = size, "File stored");

        Ok(StoredFile { size, digest })
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.path(key)?;

        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let mut file = fs::File::open(&path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;

        Ok(Bytes::from(buffer))
    }

    #[instrument(skip(self), fields(storage = "local"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path(key)?;

        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(path = ?path, "File deleted");
        }

        Ok(())
    }

    async fn delete_strict(&self, key: &str) -> StorageResult<()> {
        let path = self.path(key)?;

        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path(key)?;
        Ok(path.exists())
    }

    async fn url(&self, _key: &str) -> StorageResult<Option<String>> {
        // Private root; never web-served directly
        Ok(None)
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory storage for testing
pub struct MemoryStorage {
    files: tokio::sync::RwLock<HashMap<String, Bytes>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored files; handy for side-effect assertions.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredFile> {
        let stored = StoredFile {
            size: data.len() as u64,
            digest: calculate_digest(&data),
        };

        let mut files = self.files.write().await;
        files.insert(key.to_string(), data);

        Ok(stored)
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let files = self.files.read().await;
        files
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files.remove(key);
        Ok(())
    }

    async fn delete_strict(&self, key: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let files = self.files.read().await;
        Ok(files.contains_key(key))
    }

    async fn url(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(Some(format!("/memory/{}", key)))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
