//! Alert snapshot publishing.
//!
//! A snapshot is the `(message, title, color)` triple a dashboard polls. The
//! monitor replaces it at the end of every batch; readers always observe a
//! complete triple.

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Published alert state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSnapshot {
    /// HTML body
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: String,
}

impl AlertSnapshot {
    /// Snapshot served before anything has been published.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot for a batch with nothing alerting.
    pub fn healthy(color: impl Into<String>) -> Self {
        Self {
            message: String::new(),
            title: String::new(),
            color: color.into(),
        }
    }
}

/// Holds the latest published snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the current snapshot as a whole.
    async fn publish(&self, snapshot: &AlertSnapshot) -> Result<(), StoreError>;

    /// Latest snapshot, or [`AlertSnapshot::empty`] if none was published.
    async fn current(&self) -> Result<AlertSnapshot, StoreError>;
}
