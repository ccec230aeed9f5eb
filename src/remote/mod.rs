//! Contracts for the remote task manager the tracker reconciles against.
//! The core only ever talks to these traits; a real HTTP client is the
//! embedder's concern. [local::LocalRemote] is the file-backed realization
//! that makes the binary usable on its own.

pub mod local;

use std::{env, fmt};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Personal access token handed to every remote call.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    // The token is a secret, keep it out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Produces the credential used for remote calls.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Result<Token, TrackError>;
}

pub const TOKEN_ENV_VAR: &str = "TASKHOURS_TOKEN";

/// Reads the token from the environment. Secret storage integrations are
/// expected to implement [CredentialProvider] outside of this crate.
#[derive(Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn token(&self) -> Result<Token, TrackError> {
        match env::var(TOKEN_ENV_VAR) {
            Ok(v) if !v.is_empty() => Ok(Token::new(v)),
            _ => Err(TrackError::AuthenticationRequired),
        }
    }
}

/// Kind of a custom field on a remote task. Only number fields can be
/// tracked, but the remote may expose others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Text,
    Enum,
}

impl FieldKind {
    /// Default applied when a field is present but holds no value yet.
    /// Kinds without an entry here make an unset value an error.
    pub fn default_value(self) -> Option<f64> {
        match self {
            FieldKind::Number => Some(0.),
            FieldKind::Text | FieldKind::Enum => None,
        }
    }
}

/// A field as fetched from the remote. `value` is `None` when the field
/// exists but was never set, which is distinct from the field definition
/// being absent from the task altogether.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteFieldValue {
    pub kind: FieldKind,
    pub value: Option<f64>,
}

/// What the tracker captures about a task when an interval is recorded.
/// Taken at stop time, so renames and project moves are reflected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub name: String,
    pub projects: Vec<String>,
    pub permalink: String,
}

/// Access to custom fields and task metadata on the remote.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteFields: Send + Sync {
    /// Fetches the current value of a field. Fails with
    /// [TrackError::FieldNotFound] when the task has no such field.
    async fn field_value(
        &self,
        token: &Token,
        task_id: &str,
        field_id: &str,
    ) -> Result<RemoteFieldValue, TrackError>;

    async fn set_field_value(
        &self,
        token: &Token,
        task_id: &str,
        field_id: &str,
        value: f64,
    ) -> Result<(), TrackError>;

    async fn task_snapshot(&self, token: &Token, task_id: &str)
    -> Result<TaskSnapshot, TrackError>;
}
