//! Run history: source interface, implementations, and aggregation.

pub mod aggregator;
pub mod airflow;
pub mod source;
pub mod types;

pub use aggregator::{merge_runs, select_monitored, HistoryAggregator};
pub use airflow::{AirflowConfig, AirflowSource};
pub use source::{FileSource, RunHistorySource, StaticSource};
pub use types::{
    sort_by_queued, DedupKey, RawRun, RunRecord, RunState, Timestamp, WorkflowDefinition,
};
