//! Failure-streak monitor for scheduled workflows.
//!
//! This crate provides:
//! - Run history collection from Airflow or a JSON export, with deduplication
//! - Trailing failure streak detection per workflow
//! - Tag-driven severity resolution and a global alert color
//! - HTML alert composition and last-write-wins snapshot publishing
//! - An HTTP endpoint serving the current snapshot

pub mod alerts;
pub mod compose;
pub mod config;
pub mod error;
pub mod history;
pub mod monitor;
pub mod server;
pub mod snapshot;

// Re-export main types
pub use alerts::{AlertEntry, ColorTable, FailureStreak, Severity, SeverityTable, StreakDetector};
pub use compose::MessageComposer;
pub use config::{MonitorConfig, ServerConfig};
pub use error::{ConfigError, DagwatchError, Result, SourceError, StoreError};
pub use history::{
    AirflowConfig, AirflowSource, FileSource, HistoryAggregator, RunHistorySource, RunRecord,
    StaticSource,
};
pub use monitor::{BatchOutcome, BatchReport, Monitor};
pub use snapshot::{AlertSnapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
