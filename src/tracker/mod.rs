//! Timer lifecycle and reconciliation against the remote spent-hours field.
//!
//! Operations are sequential: each one loads the state map, mutates it in
//! memory and persists it back as a whole. Calling [Tracker::stop] for the
//! same task concurrently is not supported.

use tracing::{debug, info};

use crate::{
    error::TrackError,
    remote::{CredentialProvider, RemoteFields},
    store::{
        entities::{IntervalRecord, TrackedTaskState},
        history::HistoryStore,
        state::StateStore,
    },
    utils::{clock::Clock, time::hours_between},
};

pub struct Tracker<C, R, S, H> {
    credentials: C,
    remote: R,
    state: S,
    history: H,
    clock: Box<dyn Clock>,
}

impl<C, R, S, H> Tracker<C, R, S, H>
where
    C: CredentialProvider,
    R: RemoteFields,
    S: StateStore,
    H: HistoryStore,
{
    pub fn new(credentials: C, remote: R, state: S, history: H, clock: Box<dyn Clock>) -> Self {
        Self {
            credentials,
            remote,
            state,
            history,
            clock,
        }
    }

    /// Starts a timer for a task, registering the task on first use.
    /// `field_id` names the remote numeric field the accumulated hours are
    /// reconciled with on stop.
    pub async fn start(&self, task_id: &str, field_id: &str) -> Result<(), TrackError> {
        let mut state = self.state.load().await.map_err(TrackError::Store)?;

        let entry = state
            .entry(task_id.to_string())
            .or_insert_with(|| TrackedTaskState::new(field_id));
        if entry.is_running() {
            return Err(TrackError::TimerAlreadyRunning {
                task_id: task_id.to_string(),
            });
        }
        entry.field_id = field_id.to_string();
        entry.started_at = Some(self.clock.time());

        self.state.save(&state).await.map_err(TrackError::Store)?;
        info!("Started timer for {task_id}");
        Ok(())
    }

    /// Stops the running timer for a task and returns the elapsed hours.
    ///
    /// The locally accumulated value is reconciled with the remote field
    /// first: when the two differ after integer rounding the remote was
    /// edited externally and wins. Elapsed time is then added on top and
    /// written through to the remote, and the completed interval is
    /// appended to history with a task snapshot taken now, not at start.
    ///
    /// Any failure aborts the whole operation, nothing is persisted
    /// partially.
    pub async fn stop(&self, task_id: &str) -> Result<f64, TrackError> {
        let token = self.credentials.token()?;

        let mut state = self.state.load().await.map_err(TrackError::Store)?;
        let task_state = state
            .get(task_id)
            .ok_or_else(|| TrackError::TaskNotTracked {
                task_id: task_id.to_string(),
            })?;
        let started_at = task_state
            .started_at
            .ok_or_else(|| TrackError::TimerNotRunning {
                task_id: task_id.to_string(),
            })?;
        let field_id = task_state.field_id.clone();
        let local_hours = task_state.accumulated_hours;

        let fetched = self.remote.field_value(&token, task_id, &field_id).await?;
        let remote_hours = fetched
            .value
            .or_else(|| fetched.kind.default_value())
            .ok_or_else(|| TrackError::FieldValueMissing {
                task_id: task_id.to_string(),
                field_id: field_id.clone(),
            })?;

        // Integer rounding tolerates float noise between the two values
        // while still catching real external edits, in which case the
        // remote is authoritative.
        let base_hours = if local_hours.round() != remote_hours.round() {
            debug!("Local value {local_hours} diverged from remote {remote_hours}, taking remote");
            remote_hours
        } else {
            local_hours
        };

        // One clock read serves both the elapsed computation and the
        // record's end timestamp.
        let now = self.clock.time();
        let elapsed_hours = hours_between(started_at, now);
        let accumulated_hours = base_hours + elapsed_hours;

        self.remote
            .set_field_value(&token, task_id, &field_id, accumulated_hours)
            .await?;

        let snapshot = self.remote.task_snapshot(&token, task_id).await?;
        self.history
            .append(&IntervalRecord {
                task: snapshot,
                start: started_at,
                end: now,
            })
            .await
            .map_err(TrackError::Store)?;

        state.insert(
            task_id.to_string(),
            TrackedTaskState {
                field_id,
                accumulated_hours,
                started_at: None,
            },
        );
        self.state.save(&state).await.map_err(TrackError::Store)?;

        info!("Tracked {elapsed_hours:.2}h on {task_id}");
        Ok(elapsed_hours)
    }

    /// Discards the running timer for a task. Nothing is reconciled and no
    /// interval is recorded.
    pub async fn cancel(&self, task_id: &str) -> Result<(), TrackError> {
        let mut state = self.state.load().await.map_err(TrackError::Store)?;
        let task_state = state
            .get_mut(task_id)
            .ok_or_else(|| TrackError::TaskNotTracked {
                task_id: task_id.to_string(),
            })?;
        if task_state.started_at.take().is_none() {
            return Err(TrackError::TimerNotRunning {
                task_id: task_id.to_string(),
            });
        }
        self.state.save(&state).await.map_err(TrackError::Store)?;
        info!("Discarded timer for {task_id}");
        Ok(())
    }

    /// Tracked tasks with their state, running timers first.
    pub async fn status(&self) -> Result<Vec<(String, TrackedTaskState)>, TrackError> {
        let state = self.state.load().await.map_err(TrackError::Store)?;
        let mut entries = state.into_iter().collect::<Vec<_>>();
        entries.sort_by(|(a_id, a), (b_id, b)| {
            b.is_running()
                .cmp(&a.is_running())
                .then_with(|| a_id.cmp(b_id))
        });
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        error::TrackError,
        remote::{
            CredentialProvider, FieldKind, MockRemoteFields, RemoteFieldValue, TaskSnapshot, Token,
        },
        store::{
            entities::TrackedTaskState,
            history::{HistoryStore, HistoryStoreImpl},
            state::{StateStore, StateStoreImpl},
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    use super::Tracker;

    struct StaticCredentials(Option<&'static str>);

    impl CredentialProvider for StaticCredentials {
        fn token(&self) -> Result<Token, TrackError> {
            self.0
                .map(Token::new)
                .ok_or(TrackError::AuthenticationRequired)
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn time(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn test_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 5, 12, 0, 0).unwrap()
    }

    fn test_snapshot() -> TaskSnapshot {
        TaskSnapshot {
            task_id: "t1".into(),
            name: "Write the report".into(),
            projects: vec!["Internal".into()],
            permalink: "https://tasks.example/1".into(),
        }
    }

    fn test_tracker(
        dir: &Path,
        remote: MockRemoteFields,
        now: DateTime<Utc>,
    ) -> Tracker<StaticCredentials, MockRemoteFields, StateStoreImpl, HistoryStoreImpl> {
        Tracker::new(
            StaticCredentials(Some("token")),
            remote,
            StateStoreImpl::new(dir.join("state.json")),
            HistoryStoreImpl::new(dir.join("history.jsonl")),
            Box::new(FixedClock(now)),
        )
    }

    /// Seeds state with a task whose timer started `running_for` before
    /// [test_now].
    async fn seed_state(dir: &Path, accumulated_hours: f64, running_for: Option<Duration>) {
        let store = StateStoreImpl::new(dir.join("state.json"));
        let mut map = store.load().await.unwrap();
        map.insert(
            "t1".to_string(),
            TrackedTaskState {
                field_id: "hours".into(),
                accumulated_hours,
                started_at: running_for.map(|d| test_now() - d),
            },
        );
        store.save(&map).await.unwrap();
    }

    fn remote_returning(value: Option<f64>, expected_write: f64) -> MockRemoteFields {
        let mut remote = MockRemoteFields::new();
        remote
            .expect_field_value()
            .withf(|_, task, field| task == "t1" && field == "hours")
            .times(1)
            .returning(move |_, _, _| {
                Ok(RemoteFieldValue {
                    kind: FieldKind::Number,
                    value,
                })
            });
        remote
            .expect_set_field_value()
            .withf(move |_, task, field, v| {
                task == "t1" && field == "hours" && (v - expected_write).abs() < 1e-9
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        remote
            .expect_task_snapshot()
            .times(1)
            .returning(|_, _| Ok(test_snapshot()));
        remote
    }

    #[tokio::test]
    async fn test_stop_adds_elapsed_hours() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        seed_state(dir.path(), 5., Some(Duration::minutes(90))).await;
        let tracker = test_tracker(dir.path(), remote_returning(Some(5.), 6.5), test_now());

        let elapsed = tracker.stop("t1").await?;
        assert!((elapsed - 1.5).abs() < 1e-9);

        let state = StateStoreImpl::new(dir.path().join("state.json"))
            .load()
            .await?;
        assert_eq!(state["t1"].accumulated_hours, 6.5);
        assert_eq!(state["t1"].started_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_takes_remote_value_when_diverged() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 5., Some(Duration::minutes(90))).await;
        let tracker = test_tracker(dir.path(), remote_returning(Some(8.), 9.5), test_now());

        let elapsed = tracker.stop("t1").await?;
        assert!((elapsed - 1.5).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_keeps_local_value_within_rounding_noise() -> Result<()> {
        // 5.49 and 5.0 both round to 5, so the local value survives.
        let dir = tempdir()?;
        seed_state(dir.path(), 5.49, Some(Duration::minutes(90))).await;
        let tracker = test_tracker(dir.path(), remote_returning(Some(5.), 6.99), test_now());

        tracker.stop("t1").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_defaults_unset_number_field() -> Result<()> {
        // Field exists but was never set: resolves to 0, not an error.
        let dir = tempdir()?;
        seed_state(dir.path(), 0., Some(Duration::hours(1))).await;
        let tracker = test_tracker(dir.path(), remote_returning(None, 1.), test_now());

        let elapsed = tracker.stop("t1").await?;
        assert!((elapsed - 1.).abs() < 1e-9);

        let history = HistoryStoreImpl::new(dir.path().join("history.jsonl"))
            .load()
            .await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].task, test_snapshot());
        assert_eq!(history[0].end - history[0].start, Duration::hours(1));
        assert_eq!(history[0].end, test_now());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_fails_on_valueless_field_without_default() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 0., Some(Duration::hours(1))).await;

        let mut remote = MockRemoteFields::new();
        remote.expect_field_value().times(1).returning(|_, _, _| {
            Ok(RemoteFieldValue {
                kind: FieldKind::Text,
                value: None,
            })
        });
        let tracker = test_tracker(dir.path(), remote, test_now());

        let err = tracker.stop("t1").await;
        assert!(matches!(err, Err(TrackError::FieldValueMissing { .. })));

        // Aborted as a whole: timer still running, nothing recorded.
        let state = StateStoreImpl::new(dir.path().join("state.json"))
            .load()
            .await?;
        assert!(state["t1"].is_running());
        let history = HistoryStoreImpl::new(dir.path().join("history.jsonl"))
            .load()
            .await?;
        assert!(history.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_aborts_on_missing_field() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 2., Some(Duration::hours(1))).await;

        let mut remote = MockRemoteFields::new();
        remote.expect_field_value().times(1).returning(|_, task, field| {
            Err(TrackError::FieldNotFound {
                task_id: task.to_string(),
                field_id: field.to_string(),
            })
        });
        let tracker = test_tracker(dir.path(), remote, test_now());

        let err = tracker.stop("t1").await;
        assert!(matches!(err, Err(TrackError::FieldNotFound { .. })));

        let state = StateStoreImpl::new(dir.path().join("state.json"))
            .load()
            .await?;
        assert_eq!(state["t1"].accumulated_hours, 2.);
        assert!(state["t1"].is_running());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_requires_credential() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 0., Some(Duration::hours(1))).await;

        let tracker = Tracker::new(
            StaticCredentials(None),
            MockRemoteFields::new(),
            StateStoreImpl::new(dir.path().join("state.json")),
            HistoryStoreImpl::new(dir.path().join("history.jsonl")),
            Box::new(FixedClock(test_now())),
        );

        let err = tracker.stop("t1").await;
        assert!(matches!(err, Err(TrackError::AuthenticationRequired)));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_without_timer() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 1., None).await;
        let tracker = test_tracker(dir.path(), MockRemoteFields::new(), test_now());

        let err = tracker.stop("t1").await;
        assert!(matches!(err, Err(TrackError::TimerNotRunning { .. })));

        let err = tracker.stop("unknown").await;
        assert!(matches!(err, Err(TrackError::TaskNotTracked { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_registers_and_guards_double_start() -> Result<()> {
        let dir = tempdir()?;
        let tracker = test_tracker(dir.path(), MockRemoteFields::new(), test_now());

        tracker.start("t1", "hours").await?;
        let err = tracker.start("t1", "hours").await;
        assert!(matches!(err, Err(TrackError::TimerAlreadyRunning { .. })));

        let state = StateStoreImpl::new(dir.path().join("state.json"))
            .load()
            .await?;
        assert_eq!(state["t1"].started_at, Some(test_now()));
        assert_eq!(state["t1"].accumulated_hours, 0.);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_discards_interval() -> Result<()> {
        let dir = tempdir()?;
        seed_state(dir.path(), 3., Some(Duration::hours(1))).await;
        let tracker = test_tracker(dir.path(), MockRemoteFields::new(), test_now());

        tracker.cancel("t1").await?;

        let state = StateStoreImpl::new(dir.path().join("state.json"))
            .load()
            .await?;
        assert!(!state["t1"].is_running());
        assert_eq!(state["t1"].accumulated_hours, 3.);
        let history = HistoryStoreImpl::new(dir.path().join("history.jsonl"))
            .load()
            .await?;
        assert!(history.is_empty());

        let err = tracker.cancel("t1").await;
        assert!(matches!(err, Err(TrackError::TimerNotRunning { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_consecutive_stops_extend_history() -> Result<()> {
        let dir = tempdir()?;
        let history_store = HistoryStoreImpl::new(dir.path().join("history.jsonl"));

        let mut previous = vec![];
        for round in 1u32..=3 {
            seed_state(dir.path(), 0., Some(Duration::hours(round as i64))).await;
            let expected = round as f64;
            let tracker =
                test_tracker(dir.path(), remote_returning(Some(0.), expected), test_now());
            tracker.stop("t1").await?;

            let current = history_store.load().await?;
            assert_eq!(current.len(), previous.len() + 1);
            assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_status_lists_running_first() -> Result<()> {
        let dir = tempdir()?;
        let store = StateStoreImpl::new(dir.path().join("state.json"));
        let mut map = store.load().await?;
        map.insert("idle-a".to_string(), TrackedTaskState::new("hours"));
        map.insert(
            "running".to_string(),
            TrackedTaskState {
                field_id: "hours".into(),
                accumulated_hours: 1.,
                started_at: Some(test_now()),
            },
        );
        map.insert("idle-b".to_string(), TrackedTaskState::new("hours"));
        store.save(&map).await?;

        let tracker = test_tracker(dir.path(), MockRemoteFields::new(), test_now());
        let entries = tracker.status().await?;
        let ids = entries.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["running", "idle-a", "idle-b"]);
        Ok(())
    }
}
