pub mod local;
pub mod remote;

use std::fmt;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::model::{
    EventPatch, NewEvent, NewSubject, ProfilePatch, ScheduleEvent, Subject, SubjectPatch,
    UserProfile,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("network failure: {0}")]
    Network(String),

    #[error("store rejected the request: {0}")]
    Backend(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(Uuid),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Opaque user identity, passed explicitly into every store call rather than
/// read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The persistence contract. Implementations hold no schedule state of their
/// own; callers treat every call as a fresh round trip and re-fetch rather
/// than patching stale snapshots.
pub trait ScheduleStore {
    fn fetch_subjects(&self, user: &UserId) -> Result<Vec<Subject>>;
    fn create_subject(&self, user: &UserId, subject: NewSubject) -> Result<Subject>;
    fn update_subject(&self, id: Uuid, patch: &SubjectPatch) -> Result<()>;
    fn delete_subject(&self, id: Uuid) -> Result<()>;

    /// Events ascending by start time. `from`/`to` bound the event's start
    /// and end times respectively when given.
    fn fetch_events(
        &self,
        user: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduleEvent>>;
    fn create_event(&self, user: &UserId, event: NewEvent) -> Result<ScheduleEvent>;
    fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<()>;
    fn delete_event(&self, id: Uuid) -> Result<()>;

    fn fetch_profile(&self, user: &UserId) -> Result<UserProfile>;
    fn update_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<()>;
}

pub(crate) fn validate_new_subject(subject: &NewSubject) -> Result<()> {
    if subject.name.trim().is_empty() {
        return Err(StoreError::Validation("subject name is required".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_new_event(event: &NewEvent) -> Result<()> {
    if event.title.trim().is_empty() {
        return Err(StoreError::Validation("event title is required".to_string()));
    }
    Ok(())
}

/// Pick the backend once at startup from configuration; call sites never
/// check which one they got.
#[tracing::instrument(skip(cfg, data_dir))]
pub fn open_store(cfg: &Config, data_dir: &Path) -> anyhow::Result<Box<dyn ScheduleStore>> {
    let backend = cfg
        .get("store.backend")
        .unwrap_or_else(|| "local".to_string());

    match backend.as_str() {
        "local" => {
            let store = local::LocalStore::open(data_dir)
                .with_context(|| format!("failed to open local store at {}", data_dir.display()))?;
            Ok(Box::new(store))
        }
        "remote" => {
            let base_url = cfg
                .get("remote.url")
                .filter(|url| !url.trim().is_empty())
                .context("store.backend=remote requires remote.url")?;
            let store = remote::RemoteStore::new(remote::RemoteConfig {
                base_url,
                token: cfg.get("remote.token").filter(|t| !t.trim().is_empty()),
            })
            .context("failed to build remote store client")?;
            Ok(Box::new(store))
        }
        other => anyhow::bail!("unknown store.backend: {other} (expected local or remote)"),
    }
}
