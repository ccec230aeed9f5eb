//! Local persistence for the tracker.
//! The basic idea is:
//!  - Per-task tracking state is one JSON map, always rewritten as a whole.
//!  - Completed intervals are appended to a JSON-lines log, one object per
//!    line, ordered by end time because records are only ever appended at
//!    stop time.

pub mod entities;
pub mod history;
pub mod state;
