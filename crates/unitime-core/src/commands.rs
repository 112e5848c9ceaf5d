mod event_ops;
mod subject_ops;
mod views;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::model::{ScheduleEvent, Subject};
use crate::render::Renderer;
use crate::store::{ScheduleStore, UserId};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "calendar",
        "dashboard",
        "delete",
        "done",
        "events",
        "info",
        "modify",
        "profile",
        "subjects",
        "tasks",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &dyn ScheduleStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let user = UserId::new(cfg.get("user.id").unwrap_or_else(|| "demo".to_string()));

    debug!(
        command = %inv.command,
        args = ?inv.command_args,
        user = %user,
        "dispatching command"
    );

    match inv.command.as_str() {
        "dashboard" => views::cmd_dashboard(store, renderer, &user, now),
        "calendar" => views::cmd_calendar(store, cfg, renderer, &user, &inv.command_args, now),
        "tasks" => views::cmd_tasks(store, renderer, &user, &inv.command_args, now),
        "events" => views::cmd_events(store, renderer, &user, &inv.command_args, now),
        "info" => event_ops::cmd_info(store, renderer, &user, &inv.command_args),
        "add" => event_ops::cmd_add(store, &user, &inv.command_args, now),
        "modify" => event_ops::cmd_modify(store, &user, &inv.command_args, now),
        "done" => event_ops::cmd_done(store, &user, &inv.command_args),
        "delete" => event_ops::cmd_delete(store, &user, &inv.command_args),
        "subjects" => subject_ops::cmd_subjects(store, renderer, &user, &inv.command_args),
        "profile" => subject_ops::cmd_profile(store, &user, &inv.command_args),
        "_show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<(String, String)> = cfg
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: unitime [global flags] <command> [args]

commands:
  dashboard                      upcoming events, deadlines and totals (default)
  calendar [week] [next|prev|DATE]
                                 month grid, or a week strip with 'week'
  tasks [all|pending|completed]  deadlines, exams and study blocks
  events [FROM [TO]]             flat event listing, optionally bounded
  info ID                        full detail for one event
  add TITLE... start:EXPR [end:EXPR] [type:T] [subject:REF] [priority:P] [desc:TEXT]
  modify ID [mods]               change fields; subject:none clears the link
  done ID                        toggle completion
  delete ID                      remove an event
  subjects [add|modify|delete]   manage subjects
  profile [name:N] [email:E]     show or update the profile
  version                        print the version

IDs may be abbreviated to a unique prefix. Time expressions accept
today/tomorrow, weekday names, 15:30, +2d, YYYY-MM-DD and YYYY-MM-DDTHH:MM."
    );
    Ok(())
}

/// Read-path degradation: a failed fetch renders as an empty collection with
/// a warning instead of aborting the whole view.
pub(crate) fn fetch_events_or_empty(
    store: &dyn ScheduleStore,
    user: &UserId,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<ScheduleEvent> {
    match store.fetch_events(user, from, to) {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, "failed to fetch events; rendering empty view");
            eprintln!("warning: could not load events: {err}");
            vec![]
        }
    }
}

pub(crate) fn fetch_subjects_or_empty(store: &dyn ScheduleStore, user: &UserId) -> Vec<Subject> {
    match store.fetch_subjects(user) {
        Ok(subjects) => subjects,
        Err(err) => {
            warn!(error = %err, "failed to fetch subjects; rendering empty view");
            eprintln!("warning: could not load subjects: {err}");
            vec![]
        }
    }
}

/// Resolve an event by full uuid or unique id prefix against the latest
/// fetched snapshot.
pub(crate) fn find_event<'a>(
    events: &'a [ScheduleEvent],
    needle: &str,
) -> anyhow::Result<&'a ScheduleEvent> {
    let needle = needle.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(anyhow!("an event id is required"));
    }

    let mut matches = events
        .iter()
        .filter(|event| event.id.to_string().starts_with(&needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no event matches id: {needle}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("event id is ambiguous: {needle}"));
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::{expand_command_abbrev, find_event, known_command_names};
    use crate::model::{EventType, Priority, ScheduleEvent};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn abbreviations_expand_only_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("tasks", &known), Some("tasks"));
        // "d" could be dashboard, delete or done.
        assert_eq!(expand_command_abbrev("d", &known), None);
    }

    #[test]
    fn find_event_accepts_unique_prefixes() {
        let make = || ScheduleEvent {
            id: Uuid::new_v4(),
            subject_id: None,
            title: "x".to_string(),
            description: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            event_type: EventType::Other,
            priority: Priority::Medium,
            is_completed: false,
        };
        let events = vec![make(), make()];

        let full = events[0].id.to_string();
        assert_eq!(find_event(&events, &full).expect("full id").id, events[0].id);

        let prefix = &events[1].id.to_string()[..8];
        assert_eq!(find_event(&events, prefix).expect("prefix").id, events[1].id);

        assert!(find_event(&events, "").is_err());
        assert!(find_event(&events, "zzzzzzzz").is_err());
    }
}
