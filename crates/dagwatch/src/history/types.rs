//! Core types for collected run history.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A workflow as known to the scheduler at the start of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_id: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Run state as reported by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
    /// Any other scheduler state, kept verbatim
    Other(String),
}

impl RunState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl From<String> for RunState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "success" => Self::Success,
            "failed" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for RunState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RunState> for String {
    fn from(value: RunState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run exactly as a history source reports it, timestamps still raw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRun {
    pub workflow_id: String,
    #[serde(default)]
    pub definition_hash: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
    pub run_id: String,
    pub queued_at: String,
    pub execution_date: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub state: String,
    #[serde(default)]
    pub is_backfill: bool,
}

/// Composite identity of one observation. Equal keys are the same run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub workflow_id: String,
    pub definition_hash: Option<String>,
    pub id: Option<i64>,
    pub run_id: String,
    pub queued_at: String,
    pub execution_date: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub state: RunState,
    pub is_backfill: bool,
}

impl From<&RawRun> for DedupKey {
    fn from(run: &RawRun) -> Self {
        Self {
            workflow_id: run.workflow_id.clone(),
            definition_hash: run.definition_hash.clone(),
            id: run.id,
            run_id: run.run_id.clone(),
            queued_at: run.queued_at.clone(),
            execution_date: run.execution_date.clone(),
            start_date: run.start_date.clone(),
            end_date: run.end_date.clone(),
            state: RunState::from(run.state.as_str()),
            is_backfill: run.is_backfill,
        }
    }
}

/// A timestamp normalized on a best-effort basis.
///
/// Parsed values order chronologically, opaque values lexically, and every
/// parsed value sorts before every opaque one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Parsed(DateTime<Utc>),
    Opaque(String),
}

impl Timestamp {
    /// Parse a scheduler timestamp, keeping the raw text when no format fits.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::Parsed(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
            if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
                return Self::Parsed(dt.with_timezone(&Utc));
            }
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Self::Parsed(naive.and_utc());
            }
        }
        Self::Opaque(raw.to_string())
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            Self::Opaque(_) => None,
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Parsed(a), Self::Parsed(b)) => a.cmp(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.cmp(b),
            (Self::Parsed(_), Self::Opaque(_)) => Ordering::Less,
            (Self::Opaque(_), Self::Parsed(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%:z")),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}

/// A deduplicated, normalized run observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub workflow_id: String,
    pub definition_hash: Option<String>,
    pub id: Option<i64>,
    pub run_id: String,
    pub queued_at: Timestamp,
    /// Queued time as the scheduler reported it
    #[serde(skip)]
    pub queued_at_raw: String,
    pub execution_date: Timestamp,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub state: RunState,
    pub is_backfill: bool,
    /// Tags of the owning workflow when the run was collected
    pub tags: BTreeSet<String>,
}

impl RunRecord {
    /// Normalize a raw run, stamping it with the owning workflow's tags.
    pub fn from_raw(raw: RawRun, tags: &BTreeSet<String>) -> Self {
        Self {
            queued_at: Timestamp::parse(&raw.queued_at),
            queued_at_raw: raw.queued_at,
            execution_date: Timestamp::parse(&raw.execution_date),
            start_date: raw.start_date.as_deref().map(Timestamp::parse),
            end_date: raw.end_date.as_deref().map(Timestamp::parse),
            state: RunState::from(raw.state),
            workflow_id: raw.workflow_id,
            definition_hash: raw.definition_hash,
            id: raw.id,
            run_id: raw.run_id,
            is_backfill: raw.is_backfill,
            tags: tags.clone(),
        }
    }
}

/// Sort runs by queued time, oldest first.
///
/// Chronological when every queued time parsed. If any did not, the whole
/// set falls back to ordering by the raw text. The sort is stable.
pub fn sort_by_queued(runs: &mut [&RunRecord]) {
    if runs.iter().all(|r| r.queued_at.as_datetime().is_some()) {
        runs.sort_by(|a, b| a.queued_at.cmp(&b.queued_at));
    } else {
        runs.sort_by(|a, b| a.queued_at_raw.cmp(&b.queued_at_raw));
    }
}
