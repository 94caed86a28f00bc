//! Airflow stable REST API (v1) history source.
//!
//! Reads DAG definitions from `/api/v1/dags` and runs from
//! `/api/v1/dags/{dag_id}/dagRuns`. The REST API does not expose the numeric
//! run id or the serialized DAG hash, so both stay `None`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::RunHistorySource;
use super::types::{RawRun, WorkflowDefinition};
use crate::error::SourceError;

/// Default Airflow webserver URL
const DEFAULT_AIRFLOW_URL: &str = "http://localhost:8080";

/// Page size for list endpoints (Airflow caps this at 100 by default)
const DEFAULT_PAGE_SIZE: usize = 100;

/// Configuration for the Airflow client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AirflowConfig {
    /// Base URL of the Airflow webserver
    pub base_url: String,
    /// Basic auth user
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Items requested per page
    pub page_size: usize,
}

impl Default for AirflowConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("AIRFLOW_URL")
                .unwrap_or_else(|_| DEFAULT_AIRFLOW_URL.to_string()),
            username: std::env::var("AIRFLOW_USERNAME").ok(),
            password: std::env::var("AIRFLOW_PASSWORD").ok(),
            timeout_secs: 30,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DagCollection {
    #[serde(default)]
    dags: Vec<Dag>,
    #[serde(default)]
    total_entries: usize,
}

#[derive(Debug, Deserialize)]
struct Dag {
    dag_id: String,
    #[serde(default)]
    fileloc: Option<String>,
    #[serde(default)]
    is_paused: Option<bool>,
    #[serde(default)]
    tags: Option<Vec<DagTag>>,
}

#[derive(Debug, Deserialize)]
struct DagTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DagRunCollection {
    #[serde(default)]
    dag_runs: Vec<DagRun>,
    #[serde(default)]
    total_entries: usize,
}

#[derive(Debug, Deserialize)]
struct DagRun {
    dag_id: String,
    dag_run_id: String,
    #[serde(default)]
    execution_date: Option<String>,
    #[serde(default)]
    logical_date: Option<String>,
    #[serde(default)]
    queued_at: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    run_type: Option<String>,
}

impl From<Dag> for WorkflowDefinition {
    fn from(dag: Dag) -> Self {
        Self {
            workflow_id: dag.dag_id,
            filepath: dag.fileloc.unwrap_or_default(),
            paused: dag.is_paused.unwrap_or(false),
            tags: dag
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.name)
                .collect::<BTreeSet<_>>(),
        }
    }
}

impl From<DagRun> for RawRun {
    fn from(run: DagRun) -> Self {
        let execution_date = run
            .execution_date
            .or(run.logical_date)
            .unwrap_or_default();
        Self {
            workflow_id: run.dag_id,
            definition_hash: None,
            id: None,
            run_id: run.dag_run_id,
            queued_at: run.queued_at.unwrap_or_else(|| execution_date.clone()),
            execution_date,
            start_date: run.start_date,
            end_date: run.end_date,
            state: run.state.unwrap_or_else(|| "unknown".to_string()),
            is_backfill: run.run_type.as_deref() == Some("backfill"),
        }
    }
}

/// Airflow REST client implementing [`RunHistorySource`].
#[derive(Debug, Clone)]
pub struct AirflowSource {
    config: AirflowConfig,
    client: reqwest::Client,
}

impl AirflowSource {
    /// Create a new Airflow client with the given configuration.
    pub fn new(config: AirflowConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Create a new client with default configuration.
    pub fn with_defaults() -> Result<Self, SourceError> {
        Self::new(AirflowConfig::default())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut request = self.client.get(url).query(query);
        if let Some(user) = &self.config.username {
            request = request.basic_auth(user, self.config.password.as_deref());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl RunHistorySource for AirflowSource {
    fn name(&self) -> &'static str {
        "airflow"
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>, SourceError> {
        let url = self.url("/api/v1/dags");
        let mut workflows = Vec::new();
        let mut offset = 0;

        loop {
            let page: DagCollection = self
                .get_json(
                    &url,
                    &[
                        ("limit", self.config.page_size.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.dags.len();
            workflows.extend(page.dags.into_iter().map(WorkflowDefinition::from));
            offset += fetched;

            if fetched == 0 || offset >= page.total_entries {
                break;
            }
        }

        debug!(count = workflows.len(), "Listed Airflow DAGs");
        Ok(workflows)
    }

    async fn runs_since(
        &self,
        workflow_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawRun>, SourceError> {
        let url = self.url(&format!("/api/v1/dags/{workflow_id}/dagRuns"));
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut runs = Vec::new();
        let mut offset = 0;

        loop {
            let page: DagRunCollection = self
                .get_json(
                    &url,
                    &[
                        ("execution_date_gte", start.clone()),
                        ("execution_date_lte", end.clone()),
                        ("limit", self.config.page_size.to_string()),
                        ("offset", offset.to_string()),
                    ],
                )
                .await?;

            let fetched = page.dag_runs.len();
            runs.extend(page.dag_runs.into_iter().map(RawRun::from));
            offset += fetched;

            if fetched == 0 || offset >= page.total_entries {
                break;
            }
        }

        debug!(workflow_id, count = runs.len(), "Fetched Airflow DAG runs");
        Ok(runs)
    }
}
