//! Batch orchestration.
//!
//! One batch lists monitored workflows, collects their run history, detects
//! trailing failure streaks, composes the alert and publishes it. Every batch
//! ends by publishing exactly one snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::alerts::{global_severity, streak_severity, Severity, SeverityTable, StreakDetector};
use crate::compose::{describe, MessageComposer};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::history::{HistoryAggregator, RunHistorySource};
use crate::snapshot::{AlertSnapshot, SnapshotStore};

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    /// No runs were found for any monitored workflow
    NoHistory,
    /// History exists but no workflow's latest run failed
    Healthy,
    /// At least one workflow is on a failure streak
    Alerting {
        workflows: Vec<String>,
        global_severity: Severity,
    },
}

/// Result of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    /// Records after deduplication
    pub records: usize,
    pub snapshot: AlertSnapshot,
}

/// Runs alert batches against a history source and a snapshot store.
pub struct Monitor {
    aggregator: HistoryAggregator,
    severities: SeverityTable,
    composer: MessageComposer,
    store: Arc<dyn SnapshotStore>,
}

impl Monitor {
    /// Build a monitor from validated configuration.
    pub fn new(
        config: &MonitorConfig,
        source: Arc<dyn RunHistorySource>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            aggregator: HistoryAggregator::new(
                source,
                config.epoch,
                config.query_timeout(),
                config.max_concurrent_queries,
            ),
            severities: config.severity_table(),
            composer: MessageComposer::new(config.colors(), config.recent_failures_limit)?,
            store,
        })
    }

    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Run one batch evaluated at `now`.
    ///
    /// Per-workflow history failures degrade to empty history. Listing
    /// workflows and publishing the snapshot are the only fallible steps.
    pub async fn run_batch(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let workflows = self
            .aggregator
            .monitored_workflows(|tag| self.severities.contains(tag))
            .await?;
        let records = self.aggregator.collect(&workflows, now).await;

        if records.is_empty() {
            info!(workflows = workflows.len(), "No run history for monitored workflows");
            return self
                .finish(BatchOutcome::NoHistory, 0, self.composer.healthy())
                .await;
        }

        let entries: Vec<_> = StreakDetector::detect(&records)
            .iter()
            .map(|streak| describe(streak, streak_severity(&self.severities, streak)))
            .collect();

        let Some(global) = global_severity(entries.iter().map(|e| e.severity)) else {
            info!(records = records.len(), "Everything is good.");
            return self
                .finish(BatchOutcome::Healthy, records.len(), self.composer.healthy())
                .await;
        };

        for entry in &entries {
            warn!(
                workflow_id = %entry.workflow_id,
                severity = entry.severity.level(),
                streak = entry.streak_length,
                "{}",
                entry.sentence
            );
        }

        let outcome = BatchOutcome::Alerting {
            workflows: entries.iter().map(|e| e.workflow_id.clone()).collect(),
            global_severity: global,
        };
        let snapshot = self.composer.compose(entries, &records)?;
        self.finish(outcome, records.len(), snapshot).await
    }

    async fn finish(
        &self,
        outcome: BatchOutcome,
        records: usize,
        snapshot: AlertSnapshot,
    ) -> Result<BatchReport> {
        self.store.publish(&snapshot).await?;
        info!(color = %snapshot.color, title = %snapshot.title, "Published alert snapshot");

        Ok(BatchReport {
            outcome,
            records,
            snapshot,
        })
    }
}
