//! Run history sources.
//!
//! The engine only ever asks a source two things: which workflows exist, and
//! which runs a workflow had in a time window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::types::{RawRun, Timestamp, WorkflowDefinition};
use crate::error::SourceError;

/// Trait for scheduler run-history backends (Airflow REST, exports, etc.).
#[async_trait]
pub trait RunHistorySource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// List every workflow definition the scheduler knows about.
    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SourceError>;

    /// Every run of `workflow_id` between `start` and `end`.
    async fn runs_since(
        &self,
        workflow_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRun>, SourceError>;
}

/// In-memory source over a fixed set of workflows and runs.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    workflows: Vec<WorkflowDefinition>,
    runs: HashMap<String, Vec<RawRun>>,
}

impl StaticSource {
    pub fn new(workflows: Vec<WorkflowDefinition>, runs: Vec<RawRun>) -> Self {
        let mut by_workflow: HashMap<String, Vec<RawRun>> = HashMap::new();
        for run in runs {
            by_workflow
                .entry(run.workflow_id.clone())
                .or_default()
                .push(run);
        }
        Self {
            workflows,
            runs: by_workflow,
        }
    }
}

/// Whether a raw execution date falls inside `[start, end]`.
/// Dates that do not parse are kept.
fn within_window(execution_date: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    Timestamp::parse(execution_date)
        .as_datetime()
        .map_or(true, |dt| dt >= start && dt <= end)
}

#[async_trait]
impl RunHistorySource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SourceError> {
        Ok(self.workflows.clone())
    }

    async fn runs_since(
        &self,
        workflow_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRun>, SourceError> {
        if !self.workflows.iter().any(|w| w.workflow_id == workflow_id) {
            return Err(SourceError::UnknownWorkflow(workflow_id.to_string()));
        }
        Ok(self
            .runs
            .get(workflow_id)
            .map(|runs| {
                runs.iter()
                    .filter(|r| within_window(&r.execution_date, start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Shape of a history export file.
#[derive(Debug, Default, Deserialize)]
struct HistoryExport {
    #[serde(default)]
    workflows: Vec<WorkflowDefinition>,
    #[serde(default)]
    runs: Vec<RawRun>,
}

/// Source backed by a JSON export `{ "workflows": [...], "runs": [...] }`.
///
/// The file is re-read on every listing so a long-running process sees
/// fresh exports.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StaticSource, SourceError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        let export: HistoryExport = serde_json::from_str(&content)?;
        Ok(StaticSource::new(export.workflows, export.runs))
    }
}

#[async_trait]
impl RunHistorySource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SourceError> {
        self.load().await?.list_workflows().await
    }

    async fn runs_since(
        &self,
        workflow_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRun>, SourceError> {
        self.load().await?.runs_since(workflow_id, start, end).await
    }
}
