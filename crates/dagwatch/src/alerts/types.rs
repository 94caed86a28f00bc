//! Core types for the alert system.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::history::Timestamp;

/// Severity for tags that have no configured level
pub const DEFAULT_SEVERITY: Severity = Severity(3);

/// Color published when no workflow is alerting
pub const HEALTHY_COLOR: &str = "#FFFFFF";

/// Alert severity level. Lower values are more severe, so `min` picks the
/// most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(pub i32);

impl Severity {
    pub const fn level(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag to severity mapping with an explicit default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityTable {
    levels: HashMap<String, Severity>,
    default: Severity,
}

impl SeverityTable {
    pub fn new(levels: HashMap<String, Severity>, default: Severity) -> Self {
        Self { levels, default }
    }

    /// Severity of a single tag, falling back to the default.
    pub fn severity(&self, tag: &str) -> Severity {
        self.levels.get(tag).copied().unwrap_or(self.default)
    }

    /// Whether a tag selects a workflow for monitoring.
    pub fn contains(&self, tag: &str) -> bool {
        self.levels.contains_key(tag)
    }

    /// Most severe level over a set of tags; the default when there are none.
    pub fn resolve<'a, I>(&self, tags: I) -> Severity
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter()
            .map(|t| self.severity(t))
            .min()
            .unwrap_or(self.default)
    }

    pub fn default_severity(&self) -> Severity {
        self.default
    }

    /// Every level reachable through this table, default included.
    pub fn reachable(&self) -> BTreeSet<Severity> {
        self.levels
            .values()
            .copied()
            .chain(std::iter::once(self.default))
            .collect()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.levels.keys().map(String::as_str)
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self::new(HashMap::new(), DEFAULT_SEVERITY)
    }
}

/// Severity to display color mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    colors: BTreeMap<Severity, String>,
    healthy: String,
}

impl ColorTable {
    pub fn new(colors: BTreeMap<Severity, String>, healthy: impl Into<String>) -> Self {
        Self {
            colors,
            healthy: healthy.into(),
        }
    }

    pub fn color(&self, severity: Severity) -> Option<&str> {
        self.colors.get(&severity).map(String::as_str)
    }

    pub fn healthy(&self) -> &str {
        &self.healthy
    }

    /// Levels in `table` that have no color.
    pub fn missing_for(&self, table: &SeverityTable) -> Vec<Severity> {
        table
            .reachable()
            .into_iter()
            .filter(|s| !self.colors.contains_key(s))
            .collect()
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new(default_colors(), HEALTHY_COLOR)
    }
}

/// Yellow, orange and red for levels 3, 2 and 1.
pub fn default_colors() -> BTreeMap<Severity, String> {
    BTreeMap::from([
        (Severity(3), "#FFDD00".to_string()),
        (Severity(2), "#FF9900".to_string()),
        (Severity(1), "#FF0000".to_string()),
    ])
}

/// The trailing run of failures for one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureStreak {
    pub workflow_id: String,
    /// Failed runs, oldest first
    pub runs: Vec<crate::history::RunRecord>,
    /// Queued time of the most recent failure
    pub last_queued_at: Timestamp,
}

impl FailureStreak {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Union of the tags carried by the streak's runs.
    pub fn tags(&self) -> BTreeSet<&String> {
        self.runs.iter().flat_map(|r| r.tags.iter()).collect()
    }
}

/// One alerting workflow, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEntry {
    pub workflow_id: String,
    pub severity: Severity,
    pub streak_length: usize,
    pub last_queued_at: Timestamp,
    pub sentence: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SeverityTable {
        SeverityTable::new(
            HashMap::from([
                ("billing".to_string(), Severity(1)),
                ("reports".to_string(), Severity(3)),
                ("etl".to_string(), Severity(2)),
            ]),
            DEFAULT_SEVERITY,
        )
    }

    #[test]
    fn test_severity_lookup_and_default() {
        let table = table();
        assert_eq!(table.severity("billing"), Severity(1));
        assert_eq!(table.severity("unlisted"), DEFAULT_SEVERITY);
        assert!(table.contains("etl"));
        assert!(!table.contains("unlisted"));
    }

    #[test]
    fn test_resolve_takes_most_severe() {
        let table = table();
        let tags = vec!["reports".to_string(), "etl".to_string()];
        assert_eq!(table.resolve(&tags), Severity(2));

        let tags = vec!["unlisted".to_string(), "reports".to_string()];
        assert_eq!(table.resolve(&tags), Severity(3));

        let none: Vec<String> = Vec::new();
        assert_eq!(table.resolve(&none), DEFAULT_SEVERITY);
    }

    #[test]
    fn test_custom_default_applies_to_unlisted() {
        let table = SeverityTable::new(
            HashMap::from([("billing".to_string(), Severity(1))]),
            Severity(5),
        );
        let tags = vec!["unlisted".to_string()];
        assert_eq!(table.resolve(&tags), Severity(5));
        assert_eq!(
            table.reachable().into_iter().collect::<Vec<_>>(),
            vec![Severity(1), Severity(5)]
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity(1) < Severity(3));
        assert_eq!(
            [Severity(3), Severity(1), Severity(2)].into_iter().min(),
            Some(Severity(1))
        );
    }

    #[test]
    fn test_color_table() {
        let colors = ColorTable::default();
        assert_eq!(colors.color(Severity(1)), Some("#FF0000"));
        assert_eq!(colors.color(Severity(3)), Some("#FFDD00"));
        assert_eq!(colors.color(Severity(4)), None);
        assert_eq!(colors.healthy(), HEALTHY_COLOR);

        let custom = SeverityTable::new(HashMap::new(), Severity(4));
        assert_eq!(colors.missing_for(&custom), vec![Severity(4)]);
        assert!(colors.missing_for(&table()).is_empty());
    }
}
