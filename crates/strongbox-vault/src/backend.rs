//! Persistence collaborators.
//!
//! Defines the [`SecretBackend`] trait the vault persists encrypted blobs
//! through, and provides [`MemoryBackend`] and [`FileBackend`]. Backends see
//! only opaque blobs addressed by [`SlotId`]; they never see plaintext.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::SlotId;

/// Extension used for slot files.
const BLOB_EXTENSION: &str = "blob";

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Async trait for persistence backends.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Store `blob` in `slot`, replacing any previous content atomically.
    async fn put(&self, slot: &SlotId, blob: &[u8]) -> Result<(), BackendError>;

    /// Fetch the blob in `slot`, or `None` when the slot is empty.
    async fn get(&self, slot: &SlotId) -> Result<Option<Vec<u8>>, BackendError>;

    /// Remove `slot`. Removing an empty slot succeeds.
    async fn delete(&self, slot: &SlotId) -> Result<(), BackendError>;

    /// Every occupied slot in `namespace`.
    async fn list_slots(&self, namespace: &str) -> Result<Vec<SlotId>, BackendError>;
}

#[async_trait]
impl<T> SecretBackend for Arc<T>
where
    T: SecretBackend + ?Sized,
{
    async fn put(&self, slot: &SlotId, blob: &[u8]) -> Result<(), BackendError> {
        (**self).put(slot, blob).await
    }

    async fn get(&self, slot: &SlotId) -> Result<Option<Vec<u8>>, BackendError> {
        (**self).get(slot).await
    }

    async fn delete(&self, slot: &SlotId) -> Result<(), BackendError> {
        (**self).delete(slot).await
    }

    async fn list_slots(&self, namespace: &str) -> Result<Vec<SlotId>, BackendError> {
        (**self).list_slots(namespace).await
    }
}

/// In-memory backend. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: RwLock<HashMap<SlotId, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots across all namespaces.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    async fn put(&self, slot: &SlotId, blob: &[u8]) -> Result<(), BackendError> {
        let mut slots = self.slots.write().await;
        slots.insert(slot.clone(), blob.to_vec());
        Ok(())
    }

    async fn get(&self, slot: &SlotId) -> Result<Option<Vec<u8>>, BackendError> {
        let slots = self.slots.read().await;
        Ok(slots.get(slot).cloned())
    }

    async fn delete(&self, slot: &SlotId) -> Result<(), BackendError> {
        let mut slots = self.slots.write().await;
        slots.remove(slot);
        Ok(())
    }

    async fn list_slots(&self, namespace: &str) -> Result<Vec<SlotId>, BackendError> {
        let slots = self.slots.read().await;
        Ok(slots
            .keys()
            .filter(|slot| slot.namespace() == namespace)
            .cloned()
            .collect())
    }
}

/// A file-system-backed store of encrypted slots.
///
/// Each slot is a file at `{root}/ns-{hex(namespace)}/{digest}.blob`.
/// Directories are created with mode `0700` and files with `0600` on Unix.
/// Writes go to a temporary file first, then rename over the target.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`. Nothing is touched until first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("ns-{}", hex::encode(namespace)))
    }

    fn slot_path(&self, slot: &SlotId) -> PathBuf {
        self.namespace_dir(slot.namespace())
            .join(format!("{}.{BLOB_EXTENSION}", slot.digest()))
    }

    /// Ensure the namespace directory exists.
    ///
    /// Directories created here get mode `0700`; a root that already exists
    /// keeps the permissions its owner gave it.
    async fn ensure_dir(&self, dir: &Path) -> Result<(), BackendError> {
        for path in [self.root.as_path(), dir] {
            if tokio::fs::try_exists(path).await? {
                continue;
            }
            tokio::fs::create_dir_all(path).await?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o700);
                tokio::fs::set_permissions(path, perms).await?;
            }
        }

        Ok(())
    }
}

/// Write `data` to `path` via a `0600` temporary file and an atomic rename.
async fn write_slot_file(path: &Path, data: &[u8]) -> Result<(), BackendError> {
    let tmp_path = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms).await?;
    }

    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;

    // Make the rename itself durable.
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            tokio::fs::File::open(parent).await?.sync_all().await?;
        }
    }

    Ok(())
}

fn is_slot_digest(stem: &str) -> bool {
    stem.len() == 64 && stem.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl SecretBackend for FileBackend {
    async fn put(&self, slot: &SlotId, blob: &[u8]) -> Result<(), BackendError> {
        self.ensure_dir(&self.namespace_dir(slot.namespace())).await?;
        let path = self.slot_path(slot);
        debug!(slot = %slot, path = %path.display(), "writing slot");
        write_slot_file(&path, blob).await
    }

    async fn get(&self, slot: &SlotId) -> Result<Option<Vec<u8>>, BackendError> {
        match tokio::fs::read(self.slot_path(slot)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, slot: &SlotId) -> Result<(), BackendError> {
        let path = self.slot_path(slot);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(slot = %slot, path = %path.display(), "deleted slot");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_slots(&self, namespace: &str) -> Result<Vec<SlotId>, BackendError> {
        let dir = self.namespace_dir(namespace);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut slots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if is_slot_digest(stem) => {
                    slots.push(SlotId::new(namespace, stem));
                }
                _ => {
                    tracing::warn!(path = %path.display(), "ignoring unrecognised file in vault directory");
                }
            }
        }

        slots.sort();
        Ok(slots)
    }
}
