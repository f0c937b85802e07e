//! Object storage contract used by the blob-backed online store.
//!
//! Paths are `/`-separated keys. Conditional writes let table creation stay
//! exactly-once across processes that share a bucket or directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use ulid::Ulid;

use crate::error::{Error, Result};

/// Precondition for conditional writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write only if the object does not exist.
    DoesNotExist,
    /// Write unconditionally.
    None,
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// The object was written.
    Success,
    /// The precondition did not hold; nothing was written.
    PreconditionFailed,
}

/// Minimal object storage used by blob-backed stores.
#[async_trait]
pub trait BlobStorage: Send + Sync + 'static {
    /// Reads an object, returning `None` if it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Bytes>>;

    /// Writes an object subject to a precondition.
    async fn put(&self, path: &str, data: Bytes, precondition: WritePrecondition)
        -> Result<WriteResult>;

    /// Deletes an object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Lists object paths under a prefix, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// In-memory object storage.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBlobStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let objects = self.objects.read().map_err(poison_err)?;
        Ok(objects.get(path).cloned())
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let mut objects = self.objects.write().map_err(poison_err)?;
        if precondition == WritePrecondition::DoesNotExist && objects.contains_key(path) {
            return Ok(WriteResult::PreconditionFailed);
        }
        objects.insert(path.to_string(), data);
        Ok(WriteResult::Success)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.objects.write().map_err(poison_err)?.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(poison_err)?;
        let mut paths: Vec<String> = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Marker in the file names of in-flight writes. Never listed.
const TMP_MARKER: &str = ".~tmp-";

/// Object storage rooted at a local directory.
///
/// Every write lands in a uniquely named temporary file first and is then
/// published under its final name, so readers never observe a partially
/// written object. Unconditional writes publish with a rename, conditional
/// ones with a hard link, which fails if the target already exists.
#[derive(Debug)]
pub struct FileBlobStorage {
    root: PathBuf,
}

impl FileBlobStorage {
    /// Creates a storage rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.split('/').any(|part| part == ".." || part == ".") || path.starts_with('/') {
            return Err(Error::storage(format!("invalid object path '{path}'")));
        }
        Ok(self.root.join(path))
    }

    /// Returns a temporary sibling of `target`, unique across handles and
    /// processes sharing the directory.
    fn temp_path(target: &Path) -> PathBuf {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(format!("{TMP_MARKER}{}", Ulid::new()));
        target.with_file_name(name)
    }

    async fn write_temp(target: &Path, data: &[u8], path: &str) -> Result<PathBuf> {
        let tmp = Self::temp_path(target);
        if let Err(e) = tokio::fs::write(&tmp, data).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage_with_source(format!("failed to write {path}"), e));
        }
        Ok(tmp)
    }

    async fn ensure_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::storage_with_source(format!("failed to create {}", parent.display()), e)
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStorage for FileBlobStorage {
    async fn get(&self, path: &str) -> Result<Option<Bytes>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_with_source(format!("failed to read {path}"), e)),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Bytes,
        precondition: WritePrecondition,
    ) -> Result<WriteResult> {
        let target = self.resolve(path)?;
        Self::ensure_parent(&target).await?;
        let tmp = Self::write_temp(&target, &data, path).await?;

        match precondition {
            WritePrecondition::DoesNotExist => {
                let linked = tokio::fs::hard_link(&tmp, &target).await;
                let _ = tokio::fs::remove_file(&tmp).await;
                match linked {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        return Ok(WriteResult::PreconditionFailed);
                    }
                    Err(e) => {
                        return Err(Error::storage_with_source(
                            format!("failed to publish {path}"),
                            e,
                        ));
                    }
                }
            }
            WritePrecondition::None => {
                if let Err(e) = tokio::fs::rename(&tmp, &target).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(Error::storage_with_source(
                        format!("failed to publish {path}"),
                        e,
                    ));
                }
            }
        }
        Ok(WriteResult::Success)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_with_source(format!("failed to delete {path}"), e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::storage_with_source(
                        format!("failed to list {}", dir.display()),
                        e,
                    ));
                }
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::storage_with_source("failed to list directory", e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::storage_with_source("failed to stat entry", e))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) && !key.contains(TMP_MARKER) {
                    paths.push(key);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}
