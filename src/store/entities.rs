use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::remote::TaskSnapshot;
use crate::utils::time::hours_between;

/// Mutable tracking state for one task. Lives in the state map keyed by the
/// task identifier. `started_at` is present iff a timer is running; start
/// sets it and stop/cancel clear it, there is never more than one running
/// timer per task.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct TrackedTaskState {
    pub field_id: String,
    pub accumulated_hours: f64,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub started_at: Option<DateTime<Utc>>,
}

impl TrackedTaskState {
    pub fn new(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            accumulated_hours: 0.,
            started_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }
}

/// One completed tracking interval, `end` always after `start`.
/// Append-only: created exactly once per stop and never mutated afterwards.
/// The task snapshot is captured at stop time, not start time.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct IntervalRecord {
    pub task: TaskSnapshot,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
}

impl IntervalRecord {
    pub fn duration_hours(&self) -> f64 {
        hours_between(self.start, self.end)
    }

    /// Hours of this interval that fall after `cutoff`. An interval that
    /// started before the cutoff but ended inside it only counts its
    /// in-window portion.
    pub fn hours_after(&self, cutoff: DateTime<Utc>) -> f64 {
        hours_between(self.start.max(cutoff), self.end)
    }
}
