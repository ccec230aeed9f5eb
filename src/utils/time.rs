
use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: f64 = 3_600_000.;

/// Fractional hours between two instants.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_HOUR
}
