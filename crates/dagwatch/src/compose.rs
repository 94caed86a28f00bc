//! Alert message composition.
//!
//! Turns alerting workflows into the published title, HTML body and color.

use handlebars::Handlebars;
use serde::Serialize;

use crate::alerts::{global_severity, AlertEntry, ColorTable, FailureStreak, Severity};
use crate::error::{DagwatchError, Result};
use crate::history::{sort_by_queued, RunRecord};
use crate::snapshot::AlertSnapshot;

/// Default number of rows in the recent failures table
pub const DEFAULT_RECENT_FAILURES: usize = 10;

const BODY_TEMPLATE: &str = "<h4>Information</h4>\
{{#each entries}}{{#unless @first}}<br>{{/unless}}\
<p>[<b>severity {{severity}}</b>] {{sentence}}</p>\
{{/each}}\
<hr><h4>Last {{limit}} failed runs</h4>\
<table><thead><tr><th>workflow_id</th><th>queued_at</th><th>tags</th></tr></thead><tbody>\
{{#each recent}}<tr><td>{{workflow_id}}</td><td>{{queued_at}}</td><td>{{tags}}</td></tr>{{/each}}\
</tbody></table>";

#[derive(Serialize)]
struct BodyContext<'a> {
    entries: Vec<EntryView<'a>>,
    limit: usize,
    recent: Vec<RecentRow<'a>>,
}

#[derive(Serialize)]
struct EntryView<'a> {
    severity: i32,
    sentence: &'a str,
}

#[derive(Serialize)]
struct RecentRow<'a> {
    workflow_id: &'a str,
    queued_at: String,
    tags: String,
}

/// One-line description of a failure streak.
pub fn sentence(streak: &FailureStreak) -> String {
    let n = streak.len();
    let suffix = if n > 1 { "s in a row" } else { "" };
    format!(
        "'{}' failed {n} time{suffix}. Was last queued at {}",
        streak.workflow_id, streak.last_queued_at
    )
}

/// Alert entry for a streak at the given severity.
pub fn describe(streak: &FailureStreak, severity: Severity) -> AlertEntry {
    AlertEntry {
        workflow_id: streak.workflow_id.clone(),
        severity,
        streak_length: streak.len(),
        last_queued_at: streak.last_queued_at.clone(),
        sentence: sentence(streak),
    }
}

/// Renders alert snapshots.
pub struct MessageComposer {
    handlebars: Handlebars<'static>,
    colors: ColorTable,
    recent_limit: usize,
}

impl MessageComposer {
    pub fn new(colors: ColorTable, recent_limit: usize) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_template_string("body", BODY_TEMPLATE)?;

        Ok(Self {
            handlebars,
            colors,
            recent_limit,
        })
    }

    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    /// Snapshot published when nothing is alerting.
    pub fn healthy(&self) -> AlertSnapshot {
        AlertSnapshot::healthy(self.colors.healthy())
    }

    /// Compose the snapshot for a batch.
    ///
    /// Entries are ordered most severe first; ties keep their incoming order.
    /// `history` feeds the recent failures table.
    pub fn compose(
        &self,
        mut entries: Vec<AlertEntry>,
        history: &[RunRecord],
    ) -> Result<AlertSnapshot> {
        let Some(global) = global_severity(entries.iter().map(|e| e.severity)) else {
            return Ok(self.healthy());
        };
        let color = self
            .colors
            .color(global)
            .ok_or(DagwatchError::MissingColor(global.level()))?
            .to_string();

        entries.sort_by_key(|e| e.severity);

        Ok(AlertSnapshot {
            message: self.body(&entries, history)?,
            title: title(&entries),
            color,
        })
    }

    fn body(&self, entries: &[AlertEntry], history: &[RunRecord]) -> Result<String> {
        let context = BodyContext {
            entries: entries
                .iter()
                .map(|e| EntryView {
                    severity: e.severity.level(),
                    sentence: &e.sentence,
                })
                .collect(),
            limit: self.recent_limit,
            recent: recent_failures(history, self.recent_limit)
                .into_iter()
                .map(|r| RecentRow {
                    workflow_id: &r.workflow_id,
                    queued_at: r.queued_at.to_string(),
                    tags: r.tags.iter().cloned().collect::<Vec<_>>().join(", "),
                })
                .collect(),
        };
        Ok(self.handlebars.render("body", &context)?)
    }
}

fn title(entries: &[AlertEntry]) -> String {
    let parts: Vec<String> = entries
        .iter()
        .map(|e| format!("'{}' (severity {})", e.workflow_id, e.severity))
        .collect();
    format!("{} failed: {}", entries.len(), parts.join(", "))
}

/// Most recently queued failed runs, newest first.
fn recent_failures(history: &[RunRecord], limit: usize) -> Vec<&RunRecord> {
    let mut failed: Vec<&RunRecord> = history.iter().filter(|r| r.state.is_failed()).collect();
    sort_by_queued(&mut failed);
    failed.reverse();
    failed.truncate(limit);
    failed
}
