//! In-memory snapshot store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AlertSnapshot, SnapshotStore};
use crate::error::StoreError;

/// Keeps the snapshot in process memory.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshot: RwLock<Option<AlertSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn publish(&self, snapshot: &AlertSnapshot) -> Result<(), StoreError> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }

    async fn current(&self) -> Result<AlertSnapshot, StoreError> {
        Ok(self
            .snapshot
            .read()
            .await
            .clone()
            .unwrap_or_else(AlertSnapshot::empty))
    }
}
