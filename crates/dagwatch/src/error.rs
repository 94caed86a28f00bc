//! Error types for the workflow monitor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a run history source.
///
/// The aggregator swallows these per workflow; only a failure to list
/// workflow definitions reaches the caller of a batch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Scheduler answered with a non-success status
    #[error("Scheduler returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Response or export could not be decoded
    #[error("Malformed history data: {0}")]
    Decode(#[from] serde_json::Error),

    /// Export file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Query did not finish within the configured bound
    #[error("History query for {workflow_id} timed out after {timeout_secs}s")]
    Timeout { workflow_id: String, timeout_secs: u64 },

    /// Workflow is unknown to the source
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),
}

/// Errors raised by a snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("Snapshot I/O on {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot could not be (de)serialized
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration problems detected at load time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// No tags are monitored, so no workflow could ever be selected
    #[error("monitored_tags must contain at least one tag")]
    NoMonitoredTags,

    /// A reachable severity level has no display color
    #[error("No color configured for severity {0}")]
    MissingColor(i32),

    /// A numeric setting is out of range
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Errors surfaced by a batch run.
#[derive(Debug, Error)]
pub enum DagwatchError {
    /// Configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Workflow definitions could not be listed
    #[error("Failed to list workflows: {0}")]
    Source(#[from] SourceError),

    /// The snapshot could not be published
    #[error("Failed to publish snapshot: {0}")]
    Publish(#[from] StoreError),

    /// Message template failed to compile
    #[error("Invalid alert template: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Message rendering failed
    #[error("Failed to render alert message: {0}")]
    Render(#[from] handlebars::RenderError),

    /// The global severity has no display color
    #[error("No color configured for severity {0}")]
    MissingColor(i32),
}

pub type Result<T, E = DagwatchError> = std::result::Result<T, E>;
