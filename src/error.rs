use thiserror::Error;

/// Failures produced by the tracking core. Everything here aborts the
/// current operation as a whole; no partial state is ever persisted.
#[derive(Error, Debug)]
pub enum TrackError {
    /// No credential is available. Recoverable: the caller is expected to
    /// prompt the user to set one up instead of treating this as fatal.
    #[error("not authenticated, set a personal access token first")]
    AuthenticationRequired,

    #[error("can't interpret {input:?} as a report window")]
    InvalidWindow { input: String },

    /// The remote task has no definition for the tracking field at all.
    #[error("task {task_id} has no field {field_id}")]
    FieldNotFound { task_id: String, field_id: String },

    /// The field exists but holds no value and its kind has no default.
    /// Unset numeric fields never produce this, they resolve to 0.
    #[error("field {field_id} on task {task_id} has no value and no default")]
    FieldValueMissing { task_id: String, field_id: String },

    #[error("task {task_id} is not tracked, start a timer for it first")]
    TaskNotTracked { task_id: String },

    #[error("no timer is running for task {task_id}")]
    TimerNotRunning { task_id: String },

    #[error("a timer is already running for task {task_id}")]
    TimerAlreadyRunning { task_id: String },

    /// Any other failure coming out of the remote collaborator. Propagated
    /// unchanged, the core does not retry.
    #[error(transparent)]
    Remote(#[from] anyhow::Error),

    #[error("local store failure: {0}")]
    Store(#[source] anyhow::Error),
}
