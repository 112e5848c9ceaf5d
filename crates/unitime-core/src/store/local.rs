use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::datetime::{project_time_on, to_project_date};
use crate::model::{
    EventPatch, EventType, NewEvent, NewSubject, Priority, ProfilePatch, ScheduleEvent, Subject,
    SubjectPatch, UserProfile,
};
use crate::store::{
    Result, ScheduleStore, StoreError, UserId, validate_new_event, validate_new_subject,
};

/// Disconnected/demo backend: flat JSONL files under the data directory,
/// seeded with sample data the first time they are opened.
#[derive(Debug)]
pub struct LocalStore {
    pub data_dir: PathBuf,
    subjects_path: PathBuf,
    events_path: PathBuf,
    profile_path: PathBuf,
}

impl LocalStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let store = Self {
            subjects_path: data_dir.join("subjects.data"),
            events_path: data_dir.join("events.data"),
            profile_path: data_dir.join("profile.data"),
            data_dir,
        };
        store.seed_missing().context("failed to seed demo data")?;

        info!(
            data_dir = %store.data_dir.display(),
            subjects = %store.subjects_path.display(),
            events = %store.events_path.display(),
            profile = %store.profile_path.display(),
            "opened local store"
        );

        Ok(store)
    }

    /// Each missing file is seeded independently, so wiping events.data
    /// resets events without touching subjects.
    fn seed_missing(&self) -> anyhow::Result<()> {
        let mut seeded_subjects: Option<Vec<Subject>> = None;

        if !self.subjects_path.exists() {
            let subjects = sample_subjects();
            save_jsonl_atomic(&self.subjects_path, &subjects)?;
            info!(count = subjects.len(), "seeded demo subjects");
            seeded_subjects = Some(subjects);
        }

        if !self.events_path.exists() {
            let subject_id = match &seeded_subjects {
                Some(subjects) => subjects.first().map(|s| s.id),
                None => load_jsonl::<Subject>(&self.subjects_path)?
                    .first()
                    .map(|s| s.id),
            };
            let events = sample_events(subject_id)?;
            save_jsonl_atomic(&self.events_path, &events)?;
            info!(count = events.len(), "seeded demo events");
        }

        if !self.profile_path.exists() {
            let profile = UserProfile {
                name: "Demo Student".to_string(),
                email: None,
            };
            write_json_atomic(&self.profile_path, &profile)?;
            info!("seeded demo profile");
        }

        Ok(())
    }

    fn load_subjects(&self) -> Result<Vec<Subject>> {
        load_jsonl(&self.subjects_path)
    }

    fn load_events(&self) -> Result<Vec<ScheduleEvent>> {
        load_jsonl(&self.events_path)
    }
}

impl ScheduleStore for LocalStore {
    #[tracing::instrument(skip(self), fields(user = %user))]
    fn fetch_subjects(&self, user: &UserId) -> Result<Vec<Subject>> {
        self.load_subjects()
    }

    #[tracing::instrument(skip(self, subject), fields(user = %user, name = %subject.name))]
    fn create_subject(&self, user: &UserId, subject: NewSubject) -> Result<Subject> {
        validate_new_subject(&subject)?;

        let mut subjects = self.load_subjects()?;
        let created = Subject {
            id: Uuid::new_v4(),
            name: subject.name,
            code: subject.code,
            location: subject.location,
            color: subject.color,
        };
        subjects.push(created.clone());
        save_jsonl_atomic(&self.subjects_path, &subjects)?;
        Ok(created)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    fn update_subject(&self, id: Uuid, patch: &SubjectPatch) -> Result<()> {
        let mut subjects = self.load_subjects()?;
        let subject = subjects
            .iter_mut()
            .find(|subject| subject.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(subject);
        save_jsonl_atomic(&self.subjects_path, &subjects)
    }

    /// Events referencing the subject are left as-is; readers render a
    /// placeholder for the dangling reference.
    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_subject(&self, id: Uuid) -> Result<()> {
        let mut subjects = self.load_subjects()?;
        let before = subjects.len();
        subjects.retain(|subject| subject.id != id);
        if subjects.len() == before {
            return Err(StoreError::NotFound(id));
        }
        save_jsonl_atomic(&self.subjects_path, &subjects)
    }

    #[tracing::instrument(skip(self), fields(user = %user))]
    fn fetch_events(
        &self,
        user: &UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ScheduleEvent>> {
        let mut events = self.load_events()?;
        if let Some(from) = from {
            events.retain(|event| event.start_time >= from);
        }
        if let Some(to) = to {
            events.retain(|event| event.end_time <= to);
        }
        events.sort_by_key(|event| event.start_time);
        debug!(count = events.len(), "loaded events");
        Ok(events)
    }

    #[tracing::instrument(skip(self, event), fields(user = %user, title = %event.title))]
    fn create_event(&self, user: &UserId, event: NewEvent) -> Result<ScheduleEvent> {
        validate_new_event(&event)?;

        let mut events = self.load_events()?;
        let created = ScheduleEvent {
            id: Uuid::new_v4(),
            subject_id: event.subject_id,
            title: event.title,
            description: event.description,
            start_time: event.start_time,
            end_time: event.end_time,
            event_type: event.event_type,
            priority: event.priority,
            is_completed: event.is_completed,
        };
        events.push(created.clone());
        save_jsonl_atomic(&self.events_path, &events)?;
        Ok(created)
    }

    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    fn update_event(&self, id: Uuid, patch: &EventPatch) -> Result<()> {
        let mut events = self.load_events()?;
        let event = events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(event);
        save_jsonl_atomic(&self.events_path, &events)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    fn delete_event(&self, id: Uuid) -> Result<()> {
        let mut events = self.load_events()?;
        let before = events.len();
        events.retain(|event| event.id != id);
        if events.len() == before {
            return Err(StoreError::NotFound(id));
        }
        save_jsonl_atomic(&self.events_path, &events)
    }

    #[tracing::instrument(skip(self), fields(user = %user))]
    fn fetch_profile(&self, user: &UserId) -> Result<UserProfile> {
        let raw = fs::read_to_string(&self.profile_path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    #[tracing::instrument(skip(self, patch), fields(user = %user))]
    fn update_profile(&self, user: &UserId, patch: &ProfilePatch) -> Result<()> {
        let mut profile = self.fetch_profile(user)?;
        patch.apply(&mut profile);
        write_json_atomic(&self.profile_path, &profile)
    }
}

fn sample_subjects() -> Vec<Subject> {
    vec![
        Subject {
            id: Uuid::new_v4(),
            name: "Advanced Calculus".to_string(),
            code: "MAT301".to_string(),
            location: Some("Room 301".to_string()),
            color: "#3b82f6".to_string(),
        },
        Subject {
            id: Uuid::new_v4(),
            name: "Intro to Computing".to_string(),
            code: "CS101".to_string(),
            location: Some("Lab 2".to_string()),
            color: "#10b981".to_string(),
        },
    ]
}

fn sample_events(subject_id: Option<Uuid>) -> anyhow::Result<Vec<ScheduleEvent>> {
    let today = to_project_date(Utc::now());
    let start = project_time_on(today, 9, 0)?;
    Ok(vec![ScheduleEvent {
        id: Uuid::new_v4(),
        subject_id,
        title: "Demo lecture".to_string(),
        description: None,
        start_time: start,
        end_time: start + Duration::hours(2),
        event_type: EventType::Class,
        priority: Priority::Medium,
        is_completed: false,
    }])
}

#[tracing::instrument(skip(path))]
fn load_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push(serde_json::from_str(trimmed)?);
    }

    debug!(count = out.len(), "loaded rows from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, rows))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(file = %path.display(), count = rows.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for row in rows {
        let serialized = serde_json::to_string(row)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| StoreError::Backend(format!("failed to persist {}: {err}", path.display())))?;

    Ok(())
}

#[tracing::instrument(skip(path, value))]
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| StoreError::Backend(format!("failed to persist {}: {err}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::LocalStore;
    use crate::model::EventPatch;
    use crate::store::{ScheduleStore, StoreError, UserId};

    #[test]
    fn first_open_seeds_demo_data() {
        let temp = tempdir().expect("tempdir");
        let store = LocalStore::open(temp.path()).expect("open store");
        let user = UserId::new("demo");

        let subjects = store.fetch_subjects(&user).expect("fetch subjects");
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].code, "MAT301");

        let events = store.fetch_events(&user, None, None).expect("fetch events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject_id, Some(subjects[0].id));

        let profile = store.fetch_profile(&user).expect("fetch profile");
        assert_eq!(profile.name, "Demo Student");
    }

    #[test]
    fn second_open_does_not_reseed() {
        let temp = tempdir().expect("tempdir");
        let user = UserId::new("demo");

        let store = LocalStore::open(temp.path()).expect("open store");
        let events = store.fetch_events(&user, None, None).expect("fetch events");
        store.delete_event(events[0].id).expect("delete seeded event");

        let reopened = LocalStore::open(temp.path()).expect("reopen store");
        assert!(
            reopened
                .fetch_events(&user, None, None)
                .expect("fetch events")
                .is_empty()
        );
    }

    #[test]
    fn mutating_a_missing_id_is_not_found() {
        let temp = tempdir().expect("tempdir");
        let store = LocalStore::open(temp.path()).expect("open store");

        let missing = Uuid::new_v4();
        let err = store
            .update_event(missing, &EventPatch::default())
            .expect_err("update should fail");
        assert!(matches!(err, StoreError::NotFound(id) if id == missing));

        let err = store.delete_subject(missing).expect_err("delete should fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
