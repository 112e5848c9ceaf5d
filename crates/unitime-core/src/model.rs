use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Class,
    Exam,
    Deadline,
    Study,
    Other,
}

impl EventType {
    /// A task is an event the student has to finish, not just attend.
    pub fn is_task(self) -> bool {
        matches!(self, EventType::Deadline | EventType::Exam | EventType::Study)
    }

    pub fn label(self) -> &'static str {
        match self {
            EventType::Class => "class",
            EventType::Exam => "exam",
            EventType::Deadline => "deadline",
            EventType::Study => "study",
            EventType::Other => "other",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "class" => Ok(EventType::Class),
            "exam" => Ok(EventType::Exam),
            "deadline" => Ok(EventType::Deadline),
            "study" => Ok(EventType::Study),
            "other" => Ok(EventType::Other),
            other => Err(anyhow!(
                "unknown event type: {other} (expected class/exam/deadline/study/other)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            "urgent" | "u" => Ok(Priority::Urgent),
            other => Err(anyhow!(
                "unknown priority: {other} (expected low/medium/high/urgent)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,

    pub name: String,

    pub code: String,

    #[serde(default)]
    pub location: Option<String>,

    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub id: Uuid,

    /// Weak reference; the subject may have been deleted since.
    #[serde(default)]
    pub subject_id: Option<Uuid>,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    #[serde(rename = "type")]
    pub event_type: EventType,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub is_completed: bool,
}

impl ScheduleEvent {
    pub fn is_task(&self) -> bool {
        self.event_type.is_task()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub location: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub subject_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub priority: Priority,
    pub is_completed: bool,
}

/// Field-wise partial update. `None` leaves the field untouched; the nested
/// option on nullable fields distinguishes "set to null" from "unchanged".
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<Option<Uuid>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.event_type.is_none()
            && self.priority.is_none()
            && self.is_completed.is_none()
            && self.subject_id.is_none()
    }

    pub fn apply(&self, event: &mut ScheduleEvent) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(start_time) = self.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            event.end_time = end_time;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
        if let Some(priority) = self.priority {
            event.priority = priority;
        }
        if let Some(is_completed) = self.is_completed {
            event.is_completed = is_completed;
        }
        if let Some(subject_id) = self.subject_id {
            event.subject_id = subject_id;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl SubjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.code.is_none()
            && self.location.is_none()
            && self.color.is_none()
    }

    pub fn apply(&self, subject: &mut Subject) {
        if let Some(name) = &self.name {
            subject.name = name.clone();
        }
        if let Some(code) = &self.code {
            subject.code = code.clone();
        }
        if let Some(location) = &self.location {
            subject.location = location.clone();
        }
        if let Some(color) = &self.color {
            subject.color = color.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }

    pub fn apply(&self, profile: &mut UserProfile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
    }
}
