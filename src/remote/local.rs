//! File-backed realization of [RemoteFields]. Tasks, their fields and
//! metadata live in a single JSON document that the user (or another tool)
//! is free to edit between runs, which is exactly the kind of external
//! drift reconciliation absorbs.

use std::{collections::HashMap, io::ErrorKind, path::PathBuf};

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

use super::{FieldKind, RemoteFieldValue, RemoteFields, TaskSnapshot, Token};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalField {
    pub kind: FieldKind,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalTask {
    pub name: String,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub permalink: String,
    pub fields: HashMap<String, LocalField>,
}

type TaskMap = HashMap<String, LocalTask>;

pub struct LocalRemote {
    path: PathBuf,
}

impl LocalRemote {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<TaskMap, TrackError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| TrackError::Remote(anyhow!("corrupt task file {:?}: {e}", self.path))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TaskMap::new()),
            Err(e) => Err(TrackError::Remote(e.into())),
        }
    }

    async fn save(&self, tasks: &TaskMap) -> Result<(), TrackError> {
        let bytes = serde_json::to_vec_pretty(tasks).map_err(|e| TrackError::Remote(e.into()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| TrackError::Remote(e.into()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| TrackError::Remote(e.into()))?;
        Ok(())
    }

    fn get<'a>(tasks: &'a TaskMap, task_id: &str) -> Result<&'a LocalTask, TrackError> {
        tasks
            .get(task_id)
            .ok_or_else(|| TrackError::Remote(anyhow!("unknown task {task_id}")))
    }

    /// Seeds the backing file, mainly useful for setting tasks up in tests
    /// and demos.
    pub async fn insert_task(&self, task_id: &str, task: LocalTask) -> Result<(), TrackError> {
        let mut tasks = self.load().await?;
        tasks.insert(task_id.to_string(), task);
        self.save(&tasks).await
    }
}

#[async_trait]
impl RemoteFields for LocalRemote {
    async fn field_value(
        &self,
        _token: &Token,
        task_id: &str,
        field_id: &str,
    ) -> Result<RemoteFieldValue, TrackError> {
        let tasks = self.load().await?;
        let task = Self::get(&tasks, task_id)?;
        let field = task
            .fields
            .get(field_id)
            .ok_or_else(|| TrackError::FieldNotFound {
                task_id: task_id.to_string(),
                field_id: field_id.to_string(),
            })?;
        Ok(RemoteFieldValue {
            kind: field.kind,
            value: field.value,
        })
    }

    async fn set_field_value(
        &self,
        _token: &Token,
        task_id: &str,
        field_id: &str,
        value: f64,
    ) -> Result<(), TrackError> {
        let mut tasks = self.load().await?;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TrackError::Remote(anyhow!("unknown task {task_id}")))?;
        let field = task
            .fields
            .get_mut(field_id)
            .ok_or_else(|| TrackError::FieldNotFound {
                task_id: task_id.to_string(),
                field_id: field_id.to_string(),
            })?;
        field.value = Some(value);
        self.save(&tasks).await
    }

    async fn task_snapshot(
        &self,
        _token: &Token,
        task_id: &str,
    ) -> Result<TaskSnapshot, TrackError> {
        let tasks = self.load().await?;
        let task = Self::get(&tasks, task_id)?;
        Ok(TaskSnapshot {
            task_id: task_id.to_string(),
            name: task.name.clone(),
            projects: task.projects.clone(),
            permalink: task.permalink.clone(),
        })
    }
}
