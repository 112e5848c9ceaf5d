use chrono::{Duration, Utc};
use tempfile::tempdir;
use unitime_core::model::{EventType, NewEvent, NewSubject, Priority};
use unitime_core::store::local::LocalStore;
use unitime_core::store::{ScheduleStore, StoreError, UserId};
use unitime_core::subjects::next_code;
use unitime_core::views::{dashboard, tasks};

#[test]
fn local_store_roundtrip_and_view_models() {
    let temp = tempdir().expect("tempdir");
    let store = LocalStore::open(temp.path()).expect("open store");
    let user = UserId::new("demo");

    // Seeded demo data: two subjects (hand-written codes) and one class.
    let subjects = store.fetch_subjects(&user).expect("fetch subjects");
    assert_eq!(subjects.len(), 2);

    let code = next_code(&subjects);
    assert_eq!(code, "M01");
    let subject = store
        .create_subject(
            &user,
            NewSubject {
                name: "Operating Systems".to_string(),
                code,
                location: None,
                color: "#f59e0b".to_string(),
            },
        )
        .expect("create subject");

    let now = Utc::now();
    let deadline = store
        .create_event(
            &user,
            NewEvent {
                subject_id: Some(subject.id),
                title: "Lab report".to_string(),
                description: Some("chapters 3-4".to_string()),
                start_time: now + Duration::hours(3),
                end_time: now + Duration::hours(4),
                event_type: EventType::Deadline,
                priority: Priority::High,
                is_completed: false,
            },
        )
        .expect("create event");

    let events = store.fetch_events(&user, None, None).expect("fetch events");
    assert_eq!(events.len(), 2);
    assert!(events.windows(2).all(|w| w[0].start_time <= w[1].start_time));

    let task_list = tasks::select_tasks(&events);
    assert_eq!(task_list.len(), 1);
    assert_eq!(task_list[0].id, deadline.id);

    let upcoming = dashboard::select_upcoming(&events, now, 7, 5);
    assert!(upcoming.iter().any(|event| event.id == deadline.id));

    let pending = dashboard::select_pending_deadlines(&events, 5);
    assert_eq!(pending.len(), 1);

    // Toggle completion through the store and observe it from a re-fetch.
    let patch = tasks::toggle_completion(deadline.id, &events).expect("toggle");
    store.update_event(deadline.id, &patch).expect("persist toggle");

    let events = store.fetch_events(&user, None, None).expect("refetch events");
    let toggled = events
        .iter()
        .find(|event| event.id == deadline.id)
        .expect("deadline still present");
    assert!(toggled.is_completed);

    assert!(dashboard::select_pending_deadlines(&events, 5).is_empty());
    assert!(
        tasks::filter_by_status(&tasks::select_tasks(&events), tasks::StatusFilter::Pending)
            .is_empty()
    );
}

#[test]
fn deleting_a_subject_leaves_its_events_dangling() {
    let temp = tempdir().expect("tempdir");
    let store = LocalStore::open(temp.path()).expect("open store");
    let user = UserId::new("demo");

    let subjects = store.fetch_subjects(&user).expect("fetch subjects");
    let linked = subjects[0].id;

    store.delete_subject(linked).expect("delete subject");

    let events = store.fetch_events(&user, None, None).expect("fetch events");
    let seeded = events.first().expect("seeded event survives");
    assert_eq!(seeded.subject_id, Some(linked));

    let remaining = store.fetch_subjects(&user).expect("refetch subjects");
    assert!(remaining.iter().all(|subject| subject.id != linked));
    assert_eq!(
        unitime_core::subjects::resolve_name(&remaining, seeded.subject_id).as_deref(),
        Some(unitime_core::subjects::MISSING_SUBJECT_LABEL)
    );
}

#[test]
fn empty_titles_are_rejected_before_anything_is_written() {
    let temp = tempdir().expect("tempdir");
    let store = LocalStore::open(temp.path()).expect("open store");
    let user = UserId::new("demo");

    let now = Utc::now();
    let err = store
        .create_event(
            &user,
            NewEvent {
                subject_id: None,
                title: "   ".to_string(),
                description: None,
                start_time: now,
                end_time: now + Duration::hours(1),
                event_type: EventType::Other,
                priority: Priority::Medium,
                is_completed: false,
            },
        )
        .expect_err("validation should fail");
    assert!(matches!(err, StoreError::Validation(_)));

    let events = store.fetch_events(&user, None, None).expect("fetch events");
    assert_eq!(events.len(), 1, "only the seeded event remains");
}
