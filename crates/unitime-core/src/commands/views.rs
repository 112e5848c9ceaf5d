use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::commands::{fetch_events_or_empty, fetch_subjects_or_empty};
use crate::config::Config;
use crate::datetime::{Direction, Granularity, advance_period, parse_date_expr, to_project_date};
use crate::model::UserProfile;
use crate::render::Renderer;
use crate::store::{ScheduleStore, UserId};
use crate::views::calendar::{month_grid, week_strip};
use crate::views::dashboard::{
    DEFAULT_HORIZON_DAYS, DEFAULT_LIMIT, aggregate_by_type, select_pending_deadlines,
    select_upcoming,
};
use crate::views::tasks::{StatusFilter, filter_by_status, select_tasks, sort_by_start};

#[instrument(skip(store, renderer, now), fields(user = %user))]
pub(super) fn cmd_dashboard(
    store: &dyn ScheduleStore,
    renderer: &mut Renderer,
    user: &UserId,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command dashboard");

    let events = fetch_events_or_empty(store, user, None, None);
    let profile = store.fetch_profile(user).unwrap_or_else(|err| {
        warn!(error = %err, "failed to fetch profile; using fallback name");
        UserProfile {
            name: "Student".to_string(),
            email: None,
        }
    });

    let upcoming = select_upcoming(&events, now, DEFAULT_HORIZON_DAYS, DEFAULT_LIMIT);
    let deadlines = select_pending_deadlines(&events, DEFAULT_LIMIT);
    let counts = aggregate_by_type(&events);

    renderer.print_dashboard(&profile, &upcoming, &deadlines, &counts, now)
}

#[instrument(skip(store, cfg, renderer, args, now), fields(user = %user))]
pub(super) fn cmd_calendar(
    store: &dyn ScheduleStore,
    cfg: &Config,
    renderer: &mut Renderer,
    user: &UserId,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");

    let week_start = cfg.week_start();
    let today = to_project_date(now);
    let mut granularity = Granularity::Month;
    let mut reference = today;

    for arg in args {
        match arg.to_ascii_lowercase().as_str() {
            "week" => granularity = Granularity::Week,
            "month" => granularity = Granularity::Month,
            "next" => reference = advance_period(reference, granularity, Direction::Forward),
            "prev" | "previous" => {
                reference = advance_period(reference, granularity, Direction::Backward);
            }
            _ => reference = to_project_date(parse_date_expr(arg, now)?),
        }
    }

    let events = fetch_events_or_empty(store, user, None, None);

    match granularity {
        Granularity::Month => {
            let grid = month_grid(reference, &events, week_start, today);
            renderer.print_month_grid(&grid)
        }
        Granularity::Week => {
            let strip = week_strip(reference, &events, week_start, today);
            renderer.print_week_strip(&strip)
        }
    }
}

#[instrument(skip(store, renderer, args, now), fields(user = %user))]
pub(super) fn cmd_tasks(
    store: &dyn ScheduleStore,
    renderer: &mut Renderer,
    user: &UserId,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command tasks");

    let status = match args {
        [] => StatusFilter::All,
        [one] => one.parse()?,
        _ => return Err(anyhow!("tasks: expected at most one of all/pending/completed")),
    };

    let events = fetch_events_or_empty(store, user, None, None);
    let subjects = fetch_subjects_or_empty(store, user);

    let tasks = select_tasks(&events);
    let mut filtered = filter_by_status(&tasks, status);
    sort_by_start(&mut filtered);

    renderer.print_task_table(&filtered, &subjects, now)
}

#[instrument(skip(store, renderer, args, now), fields(user = %user))]
pub(super) fn cmd_events(
    store: &dyn ScheduleStore,
    renderer: &mut Renderer,
    user: &UserId,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command events");

    if args.len() > 2 {
        return Err(anyhow!("events: expected at most FROM and TO expressions"));
    }
    let from = args.first().map(|expr| parse_date_expr(expr, now)).transpose()?;
    let to = args.get(1).map(|expr| parse_date_expr(expr, now)).transpose()?;

    let events = fetch_events_or_empty(store, user, from, to);
    let subjects = fetch_subjects_or_empty(store, user);

    renderer.print_event_table(&events, &subjects, now)
}
