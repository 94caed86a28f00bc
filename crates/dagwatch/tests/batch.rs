//! End-to-end batch tests against in-memory history.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use dagwatch::history::{RawRun, RunHistorySource, WorkflowDefinition};
use dagwatch::{
    AlertSnapshot, BatchOutcome, DagwatchError, FileSnapshotStore, MemorySnapshotStore, Monitor,
    MonitorConfig, Severity, SnapshotStore, SourceError, StaticSource, StoreError,
};

fn config() -> MonitorConfig {
    MonitorConfig {
        monitored_tags: HashMap::from([
            ("billing".to_string(), 1),
            ("etl".to_string(), 2),
            ("reports".to_string(), 3),
        ]),
        ..Default::default()
    }
}

fn workflow(id: &str, tags: &[&str]) -> WorkflowDefinition {
    WorkflowDefinition {
        workflow_id: id.to_string(),
        filepath: format!("/dags/{id}.py"),
        paused: false,
        tags: tags.iter().map(|t| (*t).to_string()).collect::<BTreeSet<_>>(),
    }
}

fn runs(workflow_id: &str, states: &[&str]) -> Vec<RawRun> {
    states
        .iter()
        .enumerate()
        .map(|(i, state)| {
            let ts = format!("2024-03-{:02}T06:00:00+00:00", i + 1);
            RawRun {
                workflow_id: workflow_id.to_string(),
                definition_hash: Some("h1".to_string()),
                id: Some(i as i64 + 1),
                run_id: format!("scheduled__{ts}"),
                queued_at: ts.clone(),
                execution_date: ts,
                state: (*state).to_string(),
                ..Default::default()
            }
        })
        .collect()
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
}

fn monitor(source: StaticSource, store: Arc<dyn SnapshotStore>) -> Monitor {
    Monitor::new(&config(), Arc::new(source), store).unwrap()
}

#[tokio::test]
async fn test_failing_billing_alerts_and_recovered_reports_does_not() {
    let mut history = runs("W", &["success", "failed", "failed", "failed"]);
    history.extend(runs("X", &["failed", "success"]));
    let source = StaticSource::new(
        vec![workflow("W", &["billing"]), workflow("X", &["reports"])],
        history,
    );
    let store = Arc::new(MemorySnapshotStore::new());
    let report = monitor(source, store.clone()).run_batch(now()).await.unwrap();

    assert_eq!(
        report.outcome,
        BatchOutcome::Alerting {
            workflows: vec!["W".to_string()],
            global_severity: Severity(1),
        }
    );
    assert_eq!(report.snapshot.title, "1 failed: 'W' (severity 1)");
    assert_eq!(report.snapshot.color, "#FF0000");
    assert!(report
        .snapshot
        .message
        .contains("failed 3 times in a row. Was last queued at 2024-03-04 06:00:00+00:00"));
    assert!(!report.snapshot.message.contains("&#x27;X&#x27;"));

    assert_eq!(store.current().await.unwrap(), report.snapshot);
}

#[tokio::test]
async fn test_empty_history_publishes_healthy_color() {
    let source = StaticSource::new(vec![workflow("W", &["billing"])], Vec::new());
    let store = Arc::new(MemorySnapshotStore::new());
    let report = monitor(source, store.clone()).run_batch(now()).await.unwrap();

    assert_eq!(report.outcome, BatchOutcome::NoHistory);
    assert_eq!(report.snapshot, AlertSnapshot::healthy("#FFFFFF"));
    assert_eq!(store.current().await.unwrap().color, "#FFFFFF");
}

#[tokio::test]
async fn test_all_green_is_healthy() {
    let source = StaticSource::new(
        vec![workflow("W", &["billing"])],
        runs("W", &["failed", "failed", "success"]),
    );
    let store = Arc::new(MemorySnapshotStore::new());
    let report = monitor(source, store).run_batch(now()).await.unwrap();

    assert_eq!(report.outcome, BatchOutcome::Healthy);
    assert_eq!(report.records, 3);
    assert_eq!(report.snapshot, AlertSnapshot::healthy("#FFFFFF"));
}

#[tokio::test]
async fn test_duplicate_observations_do_not_inflate_streaks() {
    let mut history = runs("W", &["success", "failed", "failed"]);
    history.extend(runs("W", &["success", "failed", "failed"]));
    let source = StaticSource::new(vec![workflow("W", &["billing"])], history);
    let report = monitor(source, Arc::new(MemorySnapshotStore::new()))
        .run_batch(now())
        .await
        .unwrap();

    assert_eq!(report.records, 3);
    assert!(report.snapshot.message.contains("failed 2 times in a row"));
}

#[tokio::test]
async fn test_global_severity_is_most_severe() {
    let mut history = runs("ingest", &["success", "failed"]);
    history.extend(runs("summary", &["failed", "failed"]));
    let source = StaticSource::new(
        vec![
            workflow("ingest", &["etl"]),
            workflow("summary", &["reports"]),
        ],
        history,
    );
    let report = monitor(source, Arc::new(MemorySnapshotStore::new()))
        .run_batch(now())
        .await
        .unwrap();

    assert_eq!(
        report.snapshot.title,
        "2 failed: 'ingest' (severity 2), 'summary' (severity 3)"
    );
    assert_eq!(report.snapshot.color, "#FF9900");
}

#[tokio::test]
async fn test_paused_and_unmonitored_workflows_are_ignored() {
    let mut paused = workflow("paused", &["billing"]);
    paused.paused = true;
    let mut history = runs("paused", &["failed"]);
    history.extend(runs("misc", &["failed"]));
    let source = StaticSource::new(vec![paused, workflow("misc", &["adhoc"])], history);
    let report = monitor(source, Arc::new(MemorySnapshotStore::new()))
        .run_batch(now())
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::NoHistory);
}

#[tokio::test]
async fn test_file_store_round_trip_across_batches() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("snapshot.json");

    let failing = StaticSource::new(
        vec![workflow("W", &["billing"])],
        runs("W", &["success", "failed"]),
    );
    let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(&path));
    let report = monitor(failing, store.clone()).run_batch(now()).await.unwrap();
    assert_eq!(store.current().await.unwrap(), report.snapshot);
    assert_eq!(report.snapshot.color, "#FF0000");

    let recovered = StaticSource::new(
        vec![workflow("W", &["billing"])],
        runs("W", &["success", "failed", "success"]),
    );
    monitor(recovered, store.clone()).run_batch(now()).await.unwrap();

    // A separate reader sees the latest batch.
    let reader = FileSnapshotStore::new(&path);
    assert_eq!(
        reader.current().await.unwrap(),
        AlertSnapshot::healthy("#FFFFFF")
    );
}

/// Store whose writes always fail.
struct FailingStore;

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn publish(&self, _snapshot: &AlertSnapshot) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: "/readonly/snapshot.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    async fn current(&self) -> Result<AlertSnapshot, StoreError> {
        Ok(AlertSnapshot::empty())
    }
}

/// Source where `broken` errors and `slow` outlives the query timeout.
struct FlakySource {
    inner: StaticSource,
}

#[async_trait]
impl RunHistorySource for FlakySource {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SourceError> {
        self.inner.list_workflows().await
    }

    async fn runs_since(
        &self,
        workflow_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRun>, SourceError> {
        match workflow_id {
            "broken" => Err(SourceError::Status {
                status: 500,
                url: "/api/v1/dags/broken/dagRuns".to_string(),
            }),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                self.inner.runs_since(workflow_id, start, end).await
            }
            _ => self.inner.runs_since(workflow_id, start, end).await,
        }
    }
}

#[tokio::test]
async fn test_publish_failure_fails_the_batch() {
    let source = StaticSource::new(
        vec![workflow("W", &["billing"])],
        runs("W", &["success", "failed"]),
    );
    let result = monitor(source, Arc::new(FailingStore)).run_batch(now()).await;

    assert!(matches!(
        result,
        Err(DagwatchError::Publish(StoreError::Io { .. }))
    ));
}

#[tokio::test]
async fn test_failed_and_timed_out_queries_still_publish() {
    let mut history = runs("W", &["success", "failed"]);
    history.extend(runs("broken", &["failed"]));
    history.extend(runs("slow", &["failed"]));
    let source = FlakySource {
        inner: StaticSource::new(
            vec![
                workflow("W", &["etl"]),
                workflow("broken", &["billing"]),
                workflow("slow", &["billing"]),
            ],
            history,
        ),
    };
    let config = MonitorConfig {
        query_timeout_secs: 1,
        ..config()
    };
    let store = Arc::new(MemorySnapshotStore::new());
    let report = Monitor::new(&config, Arc::new(source), store.clone())
        .unwrap()
        .run_batch(now())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        BatchOutcome::Alerting {
            workflows: vec!["W".to_string()],
            global_severity: Severity(2),
        }
    );
    assert_eq!(report.records, 2);
    assert_eq!(store.current().await.unwrap(), report.snapshot);
}

#[tokio::test]
async fn test_unparsable_queued_time_sorts_by_raw_text() {
    let mut history = vec![RawRun {
        workflow_id: "W".to_string(),
        run_id: "old".to_string(),
        queued_at: "0000-00-00 00:00:00".to_string(),
        execution_date: "2024-02-28T06:00:00+00:00".to_string(),
        state: "success".to_string(),
        ..Default::default()
    }];
    history.extend(runs("W", &["success", "failed"]));
    let source = StaticSource::new(vec![workflow("W", &["billing"])], history);
    let report = monitor(source, Arc::new(MemorySnapshotStore::new()))
        .run_batch(now())
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        BatchOutcome::Alerting {
            workflows: vec!["W".to_string()],
            global_severity: Severity(1),
        }
    );
    assert!(report
        .snapshot
        .message
        .contains("failed 1 time. Was last queued at 2024-03-02 06:00:00+00:00"));
}
