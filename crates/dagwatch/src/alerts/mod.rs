//! Alert detection for monitored workflows.
//!
//! A workflow alerts when its most recent run failed. The trailing streak of
//! failed runs carries the tags that decide its severity, and the most severe
//! workflow decides the color of the published alert.

pub mod severity;
pub mod streak;
pub mod types;

pub use severity::{global_severity, streak_severity};
pub use streak::StreakDetector;
pub use types::{
    default_colors, AlertEntry, ColorTable, FailureStreak, Severity, SeverityTable,
    DEFAULT_SEVERITY, HEALTHY_COLOR,
};
