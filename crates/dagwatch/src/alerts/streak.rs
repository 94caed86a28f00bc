//! Trailing failure streak detection.
//!
//! Runs are grouped per workflow and sorted by queued time. A workflow alerts
//! only when its most recent run failed; the streak is the last block of
//! consecutive failed runs.

use std::collections::BTreeMap;

use super::types::FailureStreak;
use crate::history::{sort_by_queued, RunRecord};

/// Detects trailing failure streaks in merged run history.
pub struct StreakDetector;

impl StreakDetector {
    /// Streaks for every workflow whose latest run failed, ordered by
    /// workflow identifier.
    pub fn detect(records: &[RunRecord]) -> Vec<FailureStreak> {
        let mut by_workflow: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
        for record in records {
            by_workflow
                .entry(record.workflow_id.as_str())
                .or_default()
                .push(record);
        }

        by_workflow
            .into_iter()
            .filter_map(|(workflow_id, mut runs)| {
                sort_by_queued(&mut runs);
                trailing_streak(workflow_id, &runs)
            })
            .collect()
    }
}

/// Streak ending a sorted run sequence, if that sequence ends in failure.
fn trailing_streak(workflow_id: &str, runs: &[&RunRecord]) -> Option<FailureStreak> {
    let last = runs.last()?;
    if !last.state.is_failed() {
        return None;
    }

    // Block id increments on every state change, oldest to newest.
    let mut block = 0usize;
    let mut blocks = Vec::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        if i == 0 || run.state != runs[i - 1].state {
            block += 1;
        }
        blocks.push(block);
    }

    let trailing_block = runs
        .iter()
        .zip(&blocks)
        .filter(|(run, _)| run.state.is_failed())
        .map(|(_, block)| *block)
        .max()?;

    let streak: Vec<RunRecord> = runs
        .iter()
        .zip(&blocks)
        .filter(|(run, block)| run.state.is_failed() && **block == trailing_block)
        .map(|(run, _)| (*run).clone())
        .collect();

    let last_queued_at = streak.last()?.queued_at.clone();

    Some(FailureStreak {
        workflow_id: workflow_id.to_string(),
        runs: streak,
        last_queued_at,
    })
}
