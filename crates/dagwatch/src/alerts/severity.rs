//! Severity resolution for alerting workflows.

use super::types::{FailureStreak, Severity, SeverityTable};

/// Most severe level over the tags present in the streak.
pub fn streak_severity(table: &SeverityTable, streak: &FailureStreak) -> Severity {
    table.resolve(streak.tags())
}

/// Most severe level across all alerting workflows, `None` when nothing alerts.
pub fn global_severity<I>(severities: I) -> Option<Severity>
where
    I: IntoIterator<Item = Severity>,
{
    severities.into_iter().min()
}
