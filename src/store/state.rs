use std::{collections::HashMap, future::Future, io::ErrorKind, path::PathBuf};

use anyhow::Result;
use tracing::debug;

use super::entities::TrackedTaskState;

pub type StateMap = HashMap<String, TrackedTaskState>;

/// Interface for abstracting storage of the per-task tracking state.
/// The map is always loaded and saved as a whole so that no reader ever
/// observes a half-updated state.
pub trait StateStore {
    fn load(&self) -> impl Future<Output = Result<StateMap>> + Send;

    fn save(&self, state: &StateMap) -> impl Future<Output = Result<()>> + Send;
}

/// The main realization of [StateStore]. One JSON file, replaced through a
/// temp file + rename so a crash mid-write leaves the previous map intact.
pub struct StateStoreImpl {
    path: PathBuf,
}

impl StateStoreImpl {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for StateStoreImpl {
    async fn load(&self) -> Result<StateMap> {
        debug!("Loading state from {:?}", self.path);
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StateMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &StateMap) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
