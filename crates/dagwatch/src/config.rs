//! Monitor configuration.
//!
//! Loaded from a JSON file; every field has a default so a file only needs
//! the monitored tags. A few deployment settings can be overridden from the
//! environment.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::{ColorTable, Severity, SeverityTable, DEFAULT_SEVERITY, HEALTHY_COLOR};
use crate::compose::DEFAULT_RECENT_FAILURES;
use crate::error::ConfigError;
use crate::history::AirflowConfig;

const DEFAULT_SNAPSHOT_PATH: &str = "/tmp/dagwatch/snapshot.json";
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8088";

/// Start of the history window: 1970-01-01T01:01:01Z
fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 1, 1, 1)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// HTTP read endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// Bearer token required on `/message` when set
    pub api_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
            api_token: None,
        }
    }
}

/// Full monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Monitored tag to severity (lower is more severe)
    pub monitored_tags: HashMap<String, i32>,
    /// Severity for tags missing from `monitored_tags`
    pub default_severity: i32,
    /// Severity to display color
    pub severity_colors: BTreeMap<i32, String>,
    /// Color published when nothing is alerting
    pub healthy_color: String,
    /// Runs are queried from this instant onwards
    pub epoch: DateTime<Utc>,
    /// Bound on a single workflow's history query
    pub query_timeout_secs: u64,
    /// Parallel history queries
    pub max_concurrent_queries: usize,
    /// Rows in the recent failures table
    pub recent_failures_limit: usize,
    /// Where the file store keeps the snapshot
    pub snapshot_path: PathBuf,
    pub airflow: AirflowConfig,
    pub server: ServerConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitored_tags: HashMap::new(),
            default_severity: DEFAULT_SEVERITY.level(),
            severity_colors: crate::alerts::default_colors()
                .into_iter()
                .map(|(s, c)| (s.level(), c))
                .collect(),
            healthy_color: HEALTHY_COLOR.to_string(),
            epoch: default_epoch(),
            query_timeout_secs: 60,
            max_concurrent_queries: 8,
            recent_failures_limit: DEFAULT_RECENT_FAILURES,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            airflow: AirflowConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a JSON file and apply env overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Override deployment settings from `DAGWATCH_*` variables.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("DAGWATCH_SNAPSHOT_PATH") {
            self.snapshot_path = PathBuf::from(path);
        }
        if let Ok(token) = std::env::var("DAGWATCH_API_TOKEN") {
            self.server.api_token = Some(token);
        }
    }

    /// Reject configurations that could never alert or could not be colored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitored_tags.is_empty() {
            return Err(ConfigError::NoMonitoredTags);
        }
        if self.query_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "query_timeout_secs",
            });
        }
        if self.recent_failures_limit == 0 {
            return Err(ConfigError::Zero {
                field: "recent_failures_limit",
            });
        }
        if let Some(missing) = self.colors().missing_for(&self.severity_table()).first() {
            return Err(ConfigError::MissingColor(missing.level()));
        }
        Ok(())
    }

    pub fn severity_table(&self) -> SeverityTable {
        SeverityTable::new(
            self.monitored_tags
                .iter()
                .map(|(tag, level)| (tag.clone(), Severity(*level)))
                .collect(),
            Severity(self.default_severity),
        )
    }

    pub fn colors(&self) -> ColorTable {
        ColorTable::new(
            self.severity_colors
                .iter()
                .map(|(level, color)| (Severity(*level), color.clone()))
                .collect(),
            self.healthy_color.clone(),
        )
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
