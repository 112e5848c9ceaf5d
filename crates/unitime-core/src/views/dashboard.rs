use chrono::{DateTime, Duration, Utc};

use crate::model::{EventType, ScheduleEvent};

pub const DEFAULT_HORIZON_DAYS: i64 = 7;
pub const DEFAULT_LIMIT: usize = 5;

/// Pending events starting within `[now, now + horizon_days)`, soonest
/// first, capped to `limit`.
pub fn select_upcoming(
    events: &[ScheduleEvent],
    now: DateTime<Utc>,
    horizon_days: i64,
    limit: usize,
) -> Vec<ScheduleEvent> {
    let horizon = now + Duration::days(horizon_days);
    let mut upcoming: Vec<ScheduleEvent> = events
        .iter()
        .filter(|event| {
            !event.is_completed && event.start_time >= now && event.start_time < horizon
        })
        .cloned()
        .collect();
    upcoming.sort_by_key(|event| event.start_time);
    upcoming.truncate(limit);
    upcoming
}

/// Unfinished deadlines in fetch order, capped to `limit`.
pub fn select_pending_deadlines(events: &[ScheduleEvent], limit: usize) -> Vec<ScheduleEvent> {
    events
        .iter()
        .filter(|event| event.event_type == EventType::Deadline && !event.is_completed)
        .take(limit)
        .cloned()
        .collect()
}

/// Event counts per type, ordered by first occurrence. Types with no events
/// simply do not appear.
pub fn aggregate_by_type(events: &[ScheduleEvent]) -> Vec<(EventType, usize)> {
    let mut counts: Vec<(EventType, usize)> = Vec::new();
    for event in events {
        match counts.iter_mut().find(|(ty, _)| *ty == event.event_type) {
            Some((_, count)) => *count += 1,
            None => counts.push((event.event_type, 1)),
        }
    }
    counts
}

pub fn greeting(local_hour: u32) -> &'static str {
    if local_hour < 12 {
        "Good morning"
    } else if local_hour < 18 {
        "Good afternoon"
    } else {
        "Good evening"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{
        DEFAULT_HORIZON_DAYS, DEFAULT_LIMIT, aggregate_by_type, greeting,
        select_pending_deadlines, select_upcoming,
    };
    use crate::model::{EventType, Priority, ScheduleEvent};

    fn event(
        event_type: EventType,
        completed: bool,
        start_offset_h: i64,
        title: &str,
    ) -> ScheduleEvent {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        ScheduleEvent {
            id: Uuid::new_v4(),
            subject_id: None,
            title: title.to_string(),
            description: None,
            start_time: now + Duration::hours(start_offset_h),
            end_time: now + Duration::hours(start_offset_h + 1),
            event_type,
            priority: Priority::Medium,
            is_completed: completed,
        }
    }

    #[test]
    fn upcoming_honors_window_completion_and_order() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        let events = vec![
            event(EventType::Class, false, -1, "already started"),
            event(EventType::Exam, false, 48, "in two days"),
            event(EventType::Deadline, true, 24, "done already"),
            event(EventType::Study, false, 2, "later today"),
            event(EventType::Other, false, 24 * 7, "exactly at horizon"),
            event(EventType::Class, false, 24 * 7 + 1, "past horizon"),
        ];

        let upcoming = select_upcoming(&events, now, DEFAULT_HORIZON_DAYS, DEFAULT_LIMIT);
        let titles: Vec<&str> = upcoming.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["later today", "in two days"]);

        let horizon = now + Duration::days(DEFAULT_HORIZON_DAYS);
        assert!(
            upcoming
                .iter()
                .all(|e| !e.is_completed && e.start_time >= now && e.start_time < horizon)
        );
    }

    #[test]
    fn upcoming_includes_an_event_starting_right_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        let events = vec![event(EventType::Class, false, 0, "starting now")];
        assert_eq!(select_upcoming(&events, now, 7, 5).len(), 1);
    }

    #[test]
    fn upcoming_truncates_to_limit() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        let events: Vec<ScheduleEvent> = (1..=8)
            .map(|h| event(EventType::Class, false, h, &format!("event {h}")))
            .collect();

        let upcoming = select_upcoming(&events, now, 7, 5);
        assert_eq!(upcoming.len(), 5);
        assert_eq!(upcoming[0].title, "event 1");
        assert_eq!(upcoming[4].title, "event 5");
    }

    #[test]
    fn pending_deadlines_keep_fetch_order() {
        let events = vec![
            event(EventType::Deadline, false, 72, "late deadline"),
            event(EventType::Exam, false, 1, "not a deadline"),
            event(EventType::Deadline, true, 2, "finished"),
            event(EventType::Deadline, false, 3, "early deadline"),
        ];

        let deadlines = select_pending_deadlines(&events, 5);
        let titles: Vec<&str> = deadlines.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["late deadline", "early deadline"]);
    }

    #[test]
    fn aggregate_counts_in_first_occurrence_order() {
        let events = vec![
            event(EventType::Class, false, 0, "a"),
            event(EventType::Class, false, 1, "b"),
            event(EventType::Exam, false, 2, "c"),
        ];

        let counts = aggregate_by_type(&events);
        assert_eq!(counts, vec![(EventType::Class, 2), (EventType::Exam, 1)]);
        assert!(aggregate_by_type(&[]).is_empty());
    }

    #[test]
    fn greeting_tracks_the_local_clock() {
        assert_eq!(greeting(7), "Good morning");
        assert_eq!(greeting(13), "Good afternoon");
        assert_eq!(greeting(21), "Good evening");
    }
}
