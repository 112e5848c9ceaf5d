use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use crate::commands::{fetch_subjects_or_empty, find_event};
use crate::datetime::parse_date_expr;
use crate::model::{EventPatch, EventType, NewEvent, Priority};
use crate::render::Renderer;
use crate::store::{ScheduleStore, UserId};
use crate::subjects::find_subject;
use crate::views::tasks::toggle_completion;

#[derive(Debug, Clone)]
enum Mod {
    Type(EventType),
    Start(DateTime<Utc>),
    End(DateTime<Utc>),
    /// `None` clears the subject link.
    Subject(Option<String>),
    Priority(Priority),
    Description(Option<String>),
    Completed(bool),
}

#[instrument(skip(args, now))]
fn parse_title_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut title_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
            continue;
        }

        title_parts.push(arg.clone());
    }

    if title_parts.is_empty() {
        return Err(anyhow!("add: a title is required"));
    }

    Ok((title_parts.join(" "), mods))
}

#[instrument(skip(args, now))]
fn parse_mods(args: &[String], now: DateTime<Utc>) -> anyhow::Result<Vec<Mod>> {
    let mut mods = Vec::new();
    for arg in args {
        if let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
        } else {
            warn!(arg = %arg, "unrecognized modifier token ignored");
        }
    }
    Ok(mods)
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    let key = key.to_ascii_lowercase();

    match key.as_str() {
        "type" | "ty" => Ok(Some(Mod::Type(value.parse()?))),
        "start" => Ok(Some(Mod::Start(parse_date_expr(value, now)?))),
        "end" => Ok(Some(Mod::End(parse_date_expr(value, now)?))),
        "subject" | "subj" => {
            if value.is_empty() || value.eq_ignore_ascii_case("none") {
                Ok(Some(Mod::Subject(None)))
            } else {
                Ok(Some(Mod::Subject(Some(value.to_string()))))
            }
        }
        "priority" | "pri" => Ok(Some(Mod::Priority(value.parse()?))),
        "desc" | "description" => {
            if value.is_empty() {
                Ok(Some(Mod::Description(None)))
            } else {
                Ok(Some(Mod::Description(Some(value.to_string()))))
            }
        }
        "completed" => Ok(Some(Mod::Completed(parse_bool_value(value)?))),
        _ => Ok(None),
    }
}

fn parse_bool_value(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "true" => Ok(true),
        "0" | "n" | "no" | "false" => Ok(false),
        other => Err(anyhow!("expected a boolean, got: {other}")),
    }
}

fn resolve_subject_ref(
    store: &dyn ScheduleStore,
    user: &UserId,
    reference: &str,
) -> anyhow::Result<uuid::Uuid> {
    let subjects = store
        .fetch_subjects(user)
        .context("failed to load subjects")?;
    Ok(find_subject(&subjects, reference)?.id)
}

#[instrument(skip(store, args, now), fields(user = %user))]
pub(super) fn cmd_add(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (title, mods) = parse_title_and_mods(args, now)?;

    let mut event_type = EventType::Class;
    let mut priority = Priority::default();
    let mut start = None;
    let mut end = None;
    let mut description = None;
    let mut subject_ref = None;
    let mut is_completed = false;

    for one_mod in mods {
        match one_mod {
            Mod::Type(ty) => event_type = ty,
            Mod::Start(dt) => start = Some(dt),
            Mod::End(dt) => end = Some(dt),
            Mod::Subject(reference) => subject_ref = reference,
            Mod::Priority(pri) => priority = pri,
            Mod::Description(desc) => description = desc,
            Mod::Completed(flag) => is_completed = flag,
        }
    }

    let start = start.ok_or_else(|| anyhow!("add: a start time is required (start:EXPR)"))?;
    let end = end.unwrap_or(start + Duration::hours(1));

    let subject_id = match &subject_ref {
        Some(reference) => Some(resolve_subject_ref(store, user, reference)?),
        None => None,
    };

    let created = store
        .create_event(
            user,
            NewEvent {
                subject_id,
                title,
                description,
                start_time: start,
                end_time: end,
                event_type,
                priority,
                is_completed,
            },
        )
        .context("failed to create event")?;

    println!(
        "Created event {} '{}'.",
        &created.id.to_string()[..8],
        created.title
    );
    Ok(())
}

#[instrument(skip(store, args, now), fields(user = %user))]
pub(super) fn cmd_modify(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let (id_ref, mod_args) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify: an event id is required"))?;
    let mods = parse_mods(mod_args, now)?;

    let events = store
        .fetch_events(user, None, None)
        .context("failed to load events")?;
    let event = find_event(&events, id_ref)?;

    let mut patch = EventPatch::default();
    for one_mod in mods {
        match one_mod {
            Mod::Type(ty) => patch.event_type = Some(ty),
            Mod::Start(dt) => patch.start_time = Some(dt),
            Mod::End(dt) => patch.end_time = Some(dt),
            Mod::Subject(None) => patch.subject_id = Some(None),
            Mod::Subject(Some(reference)) => {
                patch.subject_id = Some(Some(resolve_subject_ref(store, user, &reference)?));
            }
            Mod::Priority(pri) => patch.priority = Some(pri),
            Mod::Description(desc) => patch.description = Some(desc),
            Mod::Completed(flag) => patch.is_completed = Some(flag),
        }
    }

    if patch.is_empty() {
        return Err(anyhow!("modify: no modifications supplied"));
    }

    store
        .update_event(event.id, &patch)
        .context("failed to update event")?;

    println!("Modified event '{}'.", event.title);
    Ok(())
}

#[instrument(skip(store, args), fields(user = %user))]
pub(super) fn cmd_done(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command done");

    let id_ref = args
        .first()
        .ok_or_else(|| anyhow!("done: an event id is required"))?;

    let events = store
        .fetch_events(user, None, None)
        .context("failed to load events")?;
    let event = find_event(&events, id_ref)?;

    let patch = toggle_completion(event.id, &events)?;
    let now_completed = patch.is_completed.unwrap_or(!event.is_completed);
    store
        .update_event(event.id, &patch)
        .context("failed to update event")?;

    println!(
        "Marked '{}' as {}.",
        event.title,
        if now_completed { "completed" } else { "pending" }
    );
    Ok(())
}

#[instrument(skip(store, args), fields(user = %user))]
pub(super) fn cmd_delete(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let id_ref = args
        .first()
        .ok_or_else(|| anyhow!("delete: an event id is required"))?;

    let events = store
        .fetch_events(user, None, None)
        .context("failed to load events")?;
    let event = find_event(&events, id_ref)?;

    store
        .delete_event(event.id)
        .context("failed to delete event")?;

    println!("Deleted event '{}'.", event.title);
    Ok(())
}

#[instrument(skip(store, renderer, args), fields(user = %user))]
pub(super) fn cmd_info(
    store: &dyn ScheduleStore,
    renderer: &mut Renderer,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command info");

    let id_ref = args
        .first()
        .ok_or_else(|| anyhow!("info: an event id is required"))?;

    let events = store
        .fetch_events(user, None, None)
        .context("failed to load events")?;
    let event = find_event(&events, id_ref)?;
    let subjects = fetch_subjects_or_empty(store, user);

    renderer.print_event_info(event, &subjects)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Mod, parse_one_mod, parse_title_and_mods};
    use crate::model::{EventType, Priority};

    #[test]
    fn title_words_and_modifiers_separate() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        let args: Vec<String> = ["Midterm", "exam", "type:exam", "start:2026-03-10", "pri:high"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let (title, mods) = parse_title_and_mods(&args, now).expect("parse");
        assert_eq!(title, "Midterm exam");
        assert_eq!(mods.len(), 3);
        assert!(matches!(mods[0], Mod::Type(EventType::Exam)));
        assert!(matches!(mods[2], Mod::Priority(Priority::High)));
    }

    #[test]
    fn double_dash_forces_literal_title_words() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        let args: Vec<String> = ["--", "type:exam"].iter().map(|s| s.to_string()).collect();

        let (title, mods) = parse_title_and_mods(&args, now).expect("parse");
        assert_eq!(title, "type:exam");
        assert!(mods.is_empty());
    }

    #[test]
    fn subject_none_clears_the_link() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        assert!(matches!(
            parse_one_mod("subject:none", now).expect("parse"),
            Some(Mod::Subject(None))
        ));
        assert!(matches!(
            parse_one_mod("subject:MAT301", now).expect("parse"),
            Some(Mod::Subject(Some(_)))
        ));
    }

    #[test]
    fn unknown_keys_are_not_modifiers() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("valid");
        assert!(parse_one_mod("venue:hall", now).expect("parse").is_none());
        assert!(parse_one_mod("plain-word", now).expect("parse").is_none());
    }
}
