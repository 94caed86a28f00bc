//! File-backed snapshot store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::{AlertSnapshot, SnapshotStore};
use crate::error::StoreError;

/// Stores the snapshot as a JSON document.
///
/// Writes go to a uniquely named sibling file that is synced and then renamed
/// over the target, so a concurrent reader sees either the old or the new
/// snapshot.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "snapshot".into(), |n| n.to_string_lossy().into_owned());
        self.path
            .with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4()))
    }

    async fn write_temp(&self, tmp: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let mut file = fs::File::create(tmp)
            .await
            .map_err(|e| StoreError::io(tmp, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StoreError::io(tmp, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(tmp, e))
    }

    /// Persist the rename by syncing the containing directory.
    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = fs::File::open(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
        dir.sync_all().await.map_err(|e| StoreError::io(parent, e))
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn publish(&self, snapshot: &AlertSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();

        if let Err(e) = self.write_temp(&tmp, &bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(&self.path, e));
        }
        self.sync_parent().await?;

        debug!(path = %self.path.display(), color = %snapshot.color, "Published snapshot");
        Ok(())
    }

    async fn current(&self) -> Result<AlertSnapshot, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AlertSnapshot::empty()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}
