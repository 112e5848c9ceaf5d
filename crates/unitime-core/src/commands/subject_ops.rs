use anyhow::{Context, anyhow};
use tracing::{info, instrument, warn};

use crate::commands::fetch_subjects_or_empty;
use crate::model::{NewSubject, ProfilePatch, SubjectPatch};
use crate::render::Renderer;
use crate::store::{ScheduleStore, UserId};
use crate::subjects::{DEFAULT_SUBJECT_COLOR, find_subject, next_code};

#[derive(Debug, Clone)]
enum SubjectMod {
    Code(String),
    /// `None` clears the location.
    Location(Option<String>),
    Color(String),
}

fn parse_name_and_mods(args: &[String]) -> (String, Vec<SubjectMod>) {
    let mut name_parts = Vec::new();
    let mut mods = Vec::new();

    for arg in args {
        match parse_one_subject_mod(arg) {
            Some(one_mod) => mods.push(one_mod),
            None => name_parts.push(arg.clone()),
        }
    }

    (name_parts.join(" "), mods)
}

fn parse_one_subject_mod(tok: &str) -> Option<SubjectMod> {
    let (key, value) = tok.split_once(':').or_else(|| tok.split_once('='))?;

    match key.to_ascii_lowercase().as_str() {
        "code" => Some(SubjectMod::Code(value.to_string())),
        "location" | "loc" => {
            if value.is_empty() {
                Some(SubjectMod::Location(None))
            } else {
                Some(SubjectMod::Location(Some(value.to_string())))
            }
        }
        "color" => Some(SubjectMod::Color(value.to_string())),
        _ => None,
    }
}

#[instrument(skip(store, renderer, args), fields(user = %user))]
pub(super) fn cmd_subjects(
    store: &dyn ScheduleStore,
    renderer: &mut Renderer,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    let Some((sub, rest)) = args.split_first() else {
        info!("command subjects list");
        let subjects = fetch_subjects_or_empty(store, user);
        return renderer.print_subject_table(&subjects);
    };

    match sub.as_str() {
        "add" => cmd_subject_add(store, user, rest),
        "modify" => cmd_subject_modify(store, user, rest),
        "delete" => cmd_subject_delete(store, user, rest),
        "list" => {
            let subjects = fetch_subjects_or_empty(store, user);
            renderer.print_subject_table(&subjects)
        }
        other => Err(anyhow!(
            "subjects: unknown subcommand: {other} (expected add/modify/delete)"
        )),
    }
}

#[instrument(skip(store, args), fields(user = %user))]
fn cmd_subject_add(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command subjects add");

    let (name, mods) = parse_name_and_mods(args);
    if name.is_empty() {
        return Err(anyhow!("subjects add: a name is required"));
    }

    let mut code = None;
    let mut location = None;
    let mut color = DEFAULT_SUBJECT_COLOR.to_string();
    for one_mod in mods {
        match one_mod {
            SubjectMod::Code(value) => code = Some(value),
            SubjectMod::Location(value) => location = value,
            SubjectMod::Color(value) => color = value,
        }
    }

    // Codes are a display convenience, not an identity; a concurrent writer
    // can race this suggestion.
    let code = match code {
        Some(code) => code,
        None => {
            let existing = store
                .fetch_subjects(user)
                .context("failed to load subjects")?;
            next_code(&existing)
        }
    };

    let created = store
        .create_subject(
            user,
            NewSubject {
                name,
                code,
                location,
                color,
            },
        )
        .context("failed to create subject")?;

    println!("Created subject {} '{}'.", created.code, created.name);
    Ok(())
}

#[instrument(skip(store, args), fields(user = %user))]
fn cmd_subject_modify(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command subjects modify");

    let (id_ref, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("subjects modify: a subject reference is required"))?;

    let subjects = store
        .fetch_subjects(user)
        .context("failed to load subjects")?;
    let subject = find_subject(&subjects, id_ref)?;

    let (name, mods) = parse_name_and_mods(rest);
    let mut patch = SubjectPatch::default();
    if !name.is_empty() {
        patch.name = Some(name);
    }
    for one_mod in mods {
        match one_mod {
            SubjectMod::Code(value) => patch.code = Some(value),
            SubjectMod::Location(value) => patch.location = Some(value),
            SubjectMod::Color(value) => patch.color = Some(value),
        }
    }

    if patch.is_empty() {
        return Err(anyhow!("subjects modify: no modifications supplied"));
    }

    store
        .update_subject(subject.id, &patch)
        .context("failed to update subject")?;

    println!("Modified subject '{}'.", subject.name);
    Ok(())
}

#[instrument(skip(store, args), fields(user = %user))]
fn cmd_subject_delete(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command subjects delete");

    let id_ref = args
        .first()
        .ok_or_else(|| anyhow!("subjects delete: a subject reference is required"))?;

    let subjects = store
        .fetch_subjects(user)
        .context("failed to load subjects")?;
    let subject = find_subject(&subjects, id_ref)?;

    // Events keep their subject_id; readers render a placeholder for it.
    store
        .delete_subject(subject.id)
        .context("failed to delete subject")?;

    println!("Deleted subject '{}'.", subject.name);
    Ok(())
}

#[instrument(skip(store, args), fields(user = %user))]
pub(super) fn cmd_profile(
    store: &dyn ScheduleStore,
    user: &UserId,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command profile");

    if args.is_empty() {
        let profile = store
            .fetch_profile(user)
            .context("failed to load profile")?;
        println!("name   {}", profile.name);
        println!("email  {}", profile.email.unwrap_or_default());
        return Ok(());
    }

    let mut patch = ProfilePatch::default();
    for arg in args {
        let Some((key, value)) = arg.split_once(':').or_else(|| arg.split_once('=')) else {
            warn!(arg = %arg, "unrecognized profile token ignored");
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "name" => patch.name = Some(value.to_string()),
            "email" => {
                patch.email = if value.is_empty() {
                    Some(None)
                } else {
                    Some(Some(value.to_string()))
                };
            }
            other => warn!(key = %other, "unrecognized profile field ignored"),
        }
    }

    if patch.is_empty() {
        return Err(anyhow!("profile: no fields supplied (name:.. or email:..)"));
    }

    store
        .update_profile(user, &patch)
        .context("failed to update profile")?;

    println!("Profile updated.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SubjectMod, parse_name_and_mods};

    #[test]
    fn bare_words_become_the_name() {
        let args: Vec<String> = ["Advanced", "Calculus", "code:MAT301", "loc:Room 301"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let (name, mods) = parse_name_and_mods(&args);
        assert_eq!(name, "Advanced Calculus");
        assert_eq!(mods.len(), 2);
        assert!(matches!(&mods[0], SubjectMod::Code(code) if code == "MAT301"));
        assert!(matches!(&mods[1], SubjectMod::Location(Some(loc)) if loc == "Room 301"));
    }

    #[test]
    fn empty_location_clears() {
        let args = vec!["location:".to_string()];
        let (_, mods) = parse_name_and_mods(&args);
        assert!(matches!(mods[0], SubjectMod::Location(None)));
    }
}
