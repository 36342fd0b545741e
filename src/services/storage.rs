use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Blob categories. Each one is a flat directory under the storage root.
pub mod categories {
    /// Uploaded images, the source of every derived artifact
    pub const FILES: &str = "files";
    /// Non-image post attachments
    pub const BLOG_ASSETS: &str = "blog-assets";
    /// Derived artifacts produced by the thumbnail cache
    pub const THUMBNAILS: &str = "thumbnails";
}

/// Prefix of in-flight temp files; never a valid blob id
const TEMP_PREFIX: &str = ".blob-";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("blob {category}/{id} not found")]
    NotFound { category: String, id: String },

    #[error("blob {category}/{id} already exists")]
    AlreadyExists { category: String, id: String },

    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BlobMetadata {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Byte-addressable store over a `category/id` namespace.
///
/// Writes are published atomically: a concurrent reader of the same id sees
/// either the previous blob, the new one, or nothing, never a partial file.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data`, replacing any existing blob under the same id.
    async fn save(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Write `data` only if no blob exists under this id yet.
    async fn save_new(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, category: &str, id: &str) -> Result<Vec<u8>, StorageError>;

    /// Idempotent: deleting a missing blob succeeds.
    async fn delete(&self, category: &str, id: &str) -> Result<(), StorageError>;

    async fn exists(&self, category: &str, id: &str) -> Result<bool, StorageError>;

    /// Ids stored under `category`; empty if nothing was ever written there.
    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError>;

    async fn metadata(&self, category: &str, id: &str) -> Result<BlobMetadata, StorageError>;

    /// Stable on-disk location, suitable for streaming the file without buffering it.
    fn path(&self, category: &str, id: &str) -> Result<PathBuf, StorageError>;

    /// Whether the backing store can currently be reached.
    async fn is_available(&self) -> bool;
}

/// Filesystem-backed blob store: `{root}/{category}/{id}`.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn category_dir(&self, category: &str) -> Result<PathBuf, StorageError> {
        validate_segment(category)?;
        Ok(self.root.join(category))
    }

    async fn publish(
        &self,
        category: &str,
        id: &str,
        data: &[u8],
        replace: bool,
    ) -> Result<(), StorageError> {
        let dir = self.category_dir(category)?;
        validate_segment(id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(id);
        let data = data.to_vec();
        let (category, id) = (category.to_string(), id.to_string());

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut tmp = tempfile::Builder::new()
                .prefix(TEMP_PREFIX)
                .tempfile_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;

            if replace {
                tmp.persist(&target).map_err(|e| StorageError::Io(e.error))?;
            } else {
                tmp.persist_noclobber(&target).map_err(|e| {
                    if e.error.kind() == ErrorKind::AlreadyExists {
                        StorageError::AlreadyExists { category, id }
                    } else {
                        StorageError::Io(e.error)
                    }
                })?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.publish(category, id, data, true).await
    }

    async fn save_new(&self, category: &str, id: &str, data: &[u8]) -> Result<(), StorageError> {
        self.publish(category, id, data, false).await
    }

    async fn get(&self, category: &str, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path(category, id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                category: category.to_string(),
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, category: &str, id: &str) -> Result<(), StorageError> {
        let path = self.path(category, id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, category: &str, id: &str) -> Result<bool, StorageError> {
        let path = self.path(category, id)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, category: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.category_dir(category)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn metadata(&self, category: &str, id: &str) -> Result<BlobMetadata, StorageError> {
        let path = self.path(category, id)?;
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => {
                return Err(StorageError::NotFound {
                    category: category.to_string(),
                    id: id.to_string(),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound {
                    category: category.to_string(),
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(BlobMetadata {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn path(&self, category: &str, id: &str) -> Result<PathBuf, StorageError> {
        validate_segment(id)?;
        Ok(self.category_dir(category)?.join(id))
    }

    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .is_ok_and(|meta| meta.is_dir())
    }
}

/// Categories and ids are single, visible path components.
fn validate_segment(segment: &str) -> Result<(), StorageError> {
    let invalid = segment.is_empty()
        || segment.starts_with('.')
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains('\0');
    if invalid {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    Ok(())
}
