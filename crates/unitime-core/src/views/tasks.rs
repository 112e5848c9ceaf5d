use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{EventPatch, ScheduleEvent};
use crate::store::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(anyhow!(
                "unknown status filter: {other} (expected all/pending/completed)"
            )),
        }
    }
}

/// The task subset of the schedule: deadlines, exams, and study blocks.
/// Input order is preserved.
pub fn select_tasks(events: &[ScheduleEvent]) -> Vec<ScheduleEvent> {
    events
        .iter()
        .filter(|event| event.is_task())
        .cloned()
        .collect()
}

pub fn filter_by_status(tasks: &[ScheduleEvent], status: StatusFilter) -> Vec<ScheduleEvent> {
    tasks
        .iter()
        .filter(|task| match status {
            StatusFilter::All => true,
            StatusFilter::Pending => !task.is_completed,
            StatusFilter::Completed => task.is_completed,
        })
        .cloned()
        .collect()
}

/// Ascending by start time; ties keep their input order.
pub fn sort_by_start(tasks: &mut [ScheduleEvent]) {
    tasks.sort_by_key(|task| task.start_time);
}

pub fn is_overdue(task: &ScheduleEvent, now: DateTime<Utc>) -> bool {
    !task.is_completed && task.end_time < now
}

/// Produce the single-field patch that flips completion on the matching
/// task. Deliberately not retry-safe: issuing the resulting update twice
/// toggles twice.
pub fn toggle_completion(id: Uuid, events: &[ScheduleEvent]) -> Result<EventPatch> {
    let task = events
        .iter()
        .find(|event| event.id == id)
        .ok_or(StoreError::NotFound(id))?;

    Ok(EventPatch {
        is_completed: Some(!task.is_completed),
        ..EventPatch::default()
    })
}
