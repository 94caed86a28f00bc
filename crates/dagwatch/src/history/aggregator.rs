//! History collection across all monitored workflows.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::source::RunHistorySource;
use super::types::{DedupKey, RawRun, RunRecord, WorkflowDefinition};
use crate::error::SourceError;

/// Collects, deduplicates and normalizes run history.
pub struct HistoryAggregator {
    source: Arc<dyn RunHistorySource>,
    epoch: DateTime<Utc>,
    query_timeout: Duration,
    max_concurrent: usize,
}

impl HistoryAggregator {
    pub fn new(
        source: Arc<dyn RunHistorySource>,
        epoch: DateTime<Utc>,
        query_timeout: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            source,
            epoch,
            query_timeout,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// List workflows from the source and keep the monitored ones.
    pub async fn monitored_workflows<F>(
        &self,
        is_monitored: F,
    ) -> Result<Vec<WorkflowDefinition>, SourceError>
    where
        F: Fn(&str) -> bool,
    {
        let workflows = self.source.list_workflows().await?;
        let total = workflows.len();
        let selected = select_monitored(workflows, is_monitored);
        info!(
            source = self.source.name(),
            total,
            monitored = selected.len(),
            "Selected monitored workflows"
        );
        Ok(selected)
    }

    /// Fetch every monitored workflow's runs up to `now` and merge them.
    ///
    /// Per-workflow failures and timeouts count as zero runs.
    pub async fn collect(
        &self,
        workflows: &[WorkflowDefinition],
        now: DateTime<Utc>,
    ) -> Vec<RunRecord> {
        let batches: Vec<(WorkflowDefinition, Vec<RawRun>)> =
            stream::iter(workflows.iter().cloned())
                .map(|workflow| async move {
                    let runs = self.fetch(&workflow.workflow_id, now).await;
                    (workflow, runs)
                })
                .buffered(self.max_concurrent)
                .collect()
                .await;

        let records = merge_runs(batches);
        debug!(records = records.len(), "Merged run history");
        records
    }

    async fn fetch(&self, workflow_id: &str, now: DateTime<Utc>) -> Vec<RawRun> {
        let query = self.source.runs_since(workflow_id, self.epoch, now);
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(Ok(runs)) => runs,
            Ok(Err(e)) => {
                warn!(workflow_id, error = %e, "History query failed, treating as no runs");
                Vec::new()
            }
            Err(_) => {
                let e = SourceError::Timeout {
                    workflow_id: workflow_id.to_string(),
                    timeout_secs: self.query_timeout.as_secs(),
                };
                warn!(workflow_id, error = %e, "History query timed out, treating as no runs");
                Vec::new()
            }
        }
    }
}

/// Keep unpaused workflows carrying at least one monitored tag.
pub fn select_monitored<F>(
    workflows: Vec<WorkflowDefinition>,
    is_monitored: F,
) -> Vec<WorkflowDefinition>
where
    F: Fn(&str) -> bool,
{
    workflows
        .into_iter()
        .filter(|w| !w.paused)
        .filter(|w| w.tags.iter().any(|t| is_monitored(t.as_str())))
        .collect()
}

/// Merge per-workflow batches, dropping observations with an already-seen key.
///
/// First occurrence wins; records are stamped with their workflow's tags.
pub fn merge_runs<I>(batches: I) -> Vec<RunRecord>
where
    I: IntoIterator<Item = (WorkflowDefinition, Vec<RawRun>)>,
{
    let mut seen: HashSet<DedupKey> = HashSet::new();
    let mut records = Vec::new();

    for (workflow, runs) in batches {
        for run in runs {
            if seen.insert(DedupKey::from(&run)) {
                records.push(RunRecord::from_raw(run, &workflow.tags));
            }
        }
    }

    records
}
