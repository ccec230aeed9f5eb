//! Aggregation of the interval history into a time-allocation report over
//! a trailing window.

pub mod render;
pub mod window;

use chrono::{DateTime, Utc};

use crate::{remote::TaskSnapshot, store::entities::IntervalRecord};

use window::ReportWindow;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub task_id: String,
    pub name: String,
    pub projects: Vec<String>,
    pub hours: f64,
    pub percentage: f64,
}

impl ReportRow {
    fn new(task: &TaskSnapshot) -> Self {
        Self {
            task_id: task.task_id.clone(),
            name: task.name.clone(),
            projects: task.projects.clone(),
            hours: 0.,
            percentage: 0.,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub window: ReportWindow,
    pub rows: Vec<ReportRow>,
    pub total_hours: f64,
}

/// Buckets history records by task over the trailing window ending at
/// `now`. Rows come out in the order tasks were last worked on.
///
/// `history` must be in append order, chronological by end time. The scan
/// runs newest first and stops at the first record that ends before the
/// window, so old records are never even deserialized into rows. If the
/// log ever gains out-of-order writers this needs to become a full filter
/// over a sequence sorted by end time.
pub fn aggregate(
    window: &ReportWindow,
    history: &[IntervalRecord],
    now: DateTime<Utc>,
) -> Report {
    let min_timestamp = now - window.as_duration();

    let mut rows: Vec<ReportRow> = vec![];
    for record in history.iter().rev() {
        if record.end < min_timestamp {
            break;
        }
        let position = match rows.iter().position(|r| r.task_id == record.task.task_id) {
            Some(position) => position,
            None => {
                rows.push(ReportRow::new(&record.task));
                rows.len() - 1
            }
        };
        // An interval reaching back past the window edge only counts its
        // in-window portion.
        rows[position].hours += record.hours_after(min_timestamp);
    }

    let total_hours = rows.iter().map(|r| r.hours).sum::<f64>();
    if total_hours > 0. {
        for row in &mut rows {
            row.percentage = row.hours / total_hours * 100.;
        }
    }

    Report {
        window: window.clone(),
        rows,
        total_hours,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::{remote::TaskSnapshot, store::entities::IntervalRecord};

    use super::{aggregate, window::ReportWindow};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap()
    }

    fn record(task_id: &str, end_before_now: Duration, length: Duration) -> IntervalRecord {
        let end = now() - end_before_now;
        IntervalRecord {
            task: TaskSnapshot {
                task_id: task_id.into(),
                name: format!("task {task_id}"),
                projects: vec!["Internal".into()],
                permalink: format!("https://tasks.example/{task_id}"),
            },
            start: end - length,
            end,
        }
    }

    fn window(spec: &str) -> ReportWindow {
        ReportWindow::parse(spec).unwrap()
    }

    #[test]
    fn test_window_excludes_old_records() {
        // Log is in append order: oldest end first.
        let history = vec![
            record("a", Duration::days(10), Duration::hours(2)),
            record("b", Duration::days(5), Duration::hours(2)),
            record("c", Duration::days(1), Duration::hours(2)),
        ];

        let report = aggregate(&window("7 days"), &history, now());

        let ids = report.rows.iter().map(|r| r.task_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(report.total_hours, 4.);
    }

    #[test]
    fn test_partial_overlap_is_clipped() {
        // Ran from t-8d to t-6d; only the day inside the 7 day window
        // counts.
        let history = vec![record("a", Duration::days(6), Duration::days(2))];

        let report = aggregate(&window("7 days"), &history, now());

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].hours, 24.);
        assert_eq!(report.total_hours, 24.);
    }

    #[test]
    fn test_same_task_buckets_into_one_row() {
        let history = vec![
            record("a", Duration::hours(30), Duration::hours(1)),
            record("b", Duration::hours(20), Duration::hours(1)),
            record("a", Duration::hours(10), Duration::hours(2)),
        ];

        let report = aggregate(&window("2 days"), &history, now());

        // Most recently worked-on task first.
        let ids = report.rows.iter().map(|r| r.task_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(report.rows[0].hours, 3.);
        assert_eq!(report.rows[1].hours, 1.);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let history = vec![
            record("a", Duration::hours(10), Duration::hours(2)),
            record("b", Duration::hours(5), Duration::hours(4)),
        ];

        let report = aggregate(&window("1 day"), &history, now());

        let sum = report.rows.iter().map(|r| r.percentage).sum::<f64>();
        assert!((sum - 100.).abs() < 1e-9);
        assert!((report.rows[0].percentage - 400. / 6.).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_produces_empty_report() {
        let report = aggregate(&window("1 week"), &[], now());
        assert!(report.rows.is_empty());
        assert_eq!(report.total_hours, 0.);
    }

    #[test]
    fn test_boundary_record_is_included() {
        // end == window edge stays in.
        let history = vec![record("a", Duration::days(7), Duration::hours(1))];
        let report = aggregate(&window("7 days"), &history, now());
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].hours, 0.);
    }
}
