use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone, Utc,
    Weekday,
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "unitime-time.toml";
const TIMEZONE_ENV_VAR: &str = "UNITIME_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "UNITIME_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The timezone every "calendar day" decision is made in. Resolved once:
/// env var, then `unitime-time.toml`, then the built-in default.
pub fn project_timezone() -> &'static Tz {
    static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();
    PROJECT_TZ.get_or_init(resolve_project_timezone)
}

#[must_use]
pub fn to_project_date(dt: DateTime<Utc>) -> NaiveDate {
    dt.with_timezone(project_timezone()).date_naive()
}

#[must_use]
pub fn format_project_date(dt: DateTime<Utc>) -> String {
    dt.with_timezone(project_timezone())
        .format("%Y-%m-%d")
        .to_string()
}

#[must_use]
pub fn format_project_datetime(dt: DateTime<Utc>) -> String {
    dt.with_timezone(project_timezone())
        .format("%d/%m/%Y %H:%M")
        .to_string()
}

#[must_use]
pub fn format_project_time(dt: DateTime<Utc>) -> String {
    dt.with_timezone(project_timezone())
        .format("%H:%M")
        .to_string()
}

fn resolve_project_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR)
        && let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR)
    {
        return tz;
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    parse_timezone(DEFAULT_PROJECT_TIMEZONE, "DEFAULT_PROJECT_TIMEZONE").unwrap_or_else(|| {
        tracing::error!("failed to parse fallback timezone; using UTC");
        chrono_tz::UTC
    })
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured project timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(
                source,
                timezone = %trimmed,
                error = %err,
                "failed to parse timezone id"
            );
            None
        }
    }
}

fn to_utc_from_project_local(
    local_naive: NaiveDateTime,
    context: &str,
) -> anyhow::Result<DateTime<Utc>> {
    match project_timezone().from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Ok(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                context,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Ok(chosen.with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in configured timezone: {context}"
        )),
    }
}

/// Parse a user-supplied time expression into UTC. Accepts absolute dates
/// and datetimes in the project timezone, clock times (next occurrence),
/// weekday names (next occurrence), and `+Nd/+Nh/+Nm` relatives.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let date = to_project_date(now);
            let midnight = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow!("failed to construct midnight for today"))?;
            return to_utc_from_project_local(midnight, "today");
        }
        "tomorrow" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today + Duration::days(1));
        }
        "yesterday" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today - Duration::days(1));
        }
        _ => {}
    }

    if let Some(target_weekday) = parse_weekday_name(&lower) {
        let local_today = to_project_date(now);
        let target_date = next_weekday_date(local_today, target_weekday);
        let midnight = target_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("failed to construct weekday midnight"))?;
        return to_utc_from_project_local(midnight, "weekday-name");
    }

    if let Some((hour, minute)) = parse_clock_time(token) {
        let local_now = now.with_timezone(project_timezone());
        let mut day = local_now.date_naive();
        let local_candidate = day
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("failed to construct clock time candidate"))?;
        if local_candidate <= local_now.naive_local() {
            day = day
                .checked_add_signed(Duration::days(1))
                .ok_or_else(|| anyhow!("failed to advance to next day"))?;
        }
        let next_candidate = day
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("failed to construct next clock time candidate"))?;
        return to_utc_from_project_local(next_candidate, "clock-time");
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

    if let Some(caps) = rel_re.captures(token) {
        let sign = caps
            .name("sign")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative sign"))?;
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative unit"))?;

        let duration = match unit {
            "d" => Duration::days(num),
            "h" => Duration::hours(num),
            "m" => Duration::minutes(num),
            _ => return Err(anyhow!("unknown relative unit: {unit}")),
        };

        return Ok(if sign == "-" { now - duration } else { now + duration });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("failed to construct midnight for date"))?;
        return to_utc_from_project_local(midnight, "date");
    }

    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_project_local(ndt, fmt);
        }
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, weekday names (e.g. monday), \
         clock times (e.g. 3:23pm or 15:23), +Nd/+Nh/+Nm, RFC3339, YYYY-MM-DD, \
         YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM"
    })
}

pub fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut delta = (7 + target_idx - from_idx) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_signed(Duration::days(delta)).unwrap_or(from)
}

fn parse_clock_time(token: &str) -> Option<(u32, u32)> {
    let clock_re =
        Regex::new(r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$").ok()?;
    let captures = clock_re.captures(token.trim())?;

    let raw_hour = captures.name("hour")?.as_str().parse::<u32>().ok()?;
    let minute = captures.name("minute")?.as_str().parse::<u32>().ok()?;
    if minute > 59 {
        return None;
    }

    let hour = if let Some(ampm_match) = captures.name("ampm") {
        let ampm = ampm_match.as_str().to_ascii_lowercase();
        if raw_hour == 0 || raw_hour > 12 {
            return None;
        }
        match ampm.as_str() {
            "am" => {
                if raw_hour == 12 {
                    0
                } else {
                    raw_hour
                }
            }
            "pm" => {
                if raw_hour == 12 {
                    12
                } else {
                    raw_hour + 12
                }
            }
            _ => return None,
        }
    } else {
        if raw_hour > 23 {
            return None;
        }
        raw_hour
    };

    Some((hour, minute))
}

/// A wall-clock time on a project-timezone day, as a UTC instant.
pub fn project_time_on(date: NaiveDate, hour: u32, minute: u32) -> anyhow::Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("invalid wall-clock time {hour:02}:{minute:02}"))?;
    to_utc_from_project_local(naive, "wall-clock")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Month,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Shift the reference date by one display period. Month steps clamp to the
/// last valid day of the target month (Jan 31 forward lands on Feb 28/29);
/// week steps are exactly seven days.
pub fn advance_period(
    reference: NaiveDate,
    granularity: Granularity,
    direction: Direction,
) -> NaiveDate {
    match (granularity, direction) {
        (Granularity::Month, Direction::Forward) => reference
            .checked_add_months(Months::new(1))
            .unwrap_or(reference),
        (Granularity::Month, Direction::Backward) => reference
            .checked_sub_months(Months::new(1))
            .unwrap_or(reference),
        (Granularity::Week, Direction::Forward) => reference + Duration::days(7),
        (Granularity::Week, Direction::Backward) => reference - Duration::days(7),
    }
}

/// The first day of the displayed week containing `date`.
pub fn start_of_week(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (7 + date.weekday().num_days_from_monday() as i64
        - week_start.num_days_from_monday() as i64)
        % 7;
    date - Duration::days(offset)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc, Weekday};

    use super::{Direction, Granularity, advance_period, parse_date_expr, start_of_week};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_forward_clamps_to_end_of_month() {
        assert_eq!(
            advance_period(day(2026, 3, 31), Granularity::Month, Direction::Forward),
            day(2026, 4, 30)
        );
        assert_eq!(
            advance_period(day(2026, 1, 31), Granularity::Month, Direction::Forward),
            day(2026, 2, 28)
        );
        assert_eq!(
            advance_period(day(2024, 1, 31), Granularity::Month, Direction::Forward),
            day(2024, 2, 29)
        );
    }

    #[test]
    fn month_backward_and_week_steps() {
        assert_eq!(
            advance_period(day(2026, 3, 15), Granularity::Month, Direction::Backward),
            day(2026, 2, 15)
        );
        assert_eq!(
            advance_period(day(2026, 3, 2), Granularity::Week, Direction::Forward),
            day(2026, 3, 9)
        );
        assert_eq!(
            advance_period(day(2026, 3, 2), Granularity::Week, Direction::Backward),
            day(2026, 2, 23)
        );
    }

    #[test]
    fn start_of_week_respects_configured_first_day() {
        // 2026-03-04 is a Wednesday.
        assert_eq!(start_of_week(day(2026, 3, 4), Weekday::Mon), day(2026, 3, 2));
        assert_eq!(start_of_week(day(2026, 3, 4), Weekday::Sun), day(2026, 3, 1));
        assert_eq!(start_of_week(day(2026, 3, 2), Weekday::Mon), day(2026, 3, 2));
    }

    #[test]
    fn parses_relative_and_absolute_expressions() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");

        assert_eq!(parse_date_expr("now", now).expect("parse now"), now);
        assert_eq!(
            parse_date_expr("+2d", now).expect("parse relative"),
            now + chrono::Duration::days(2)
        );

        let rfc = parse_date_expr("2026-03-02T02:00:00Z", now).expect("parse rfc3339");
        assert_eq!(rfc, Utc.with_ymd_and_hms(2026, 3, 2, 2, 0, 0).single().expect("valid"));
    }

    #[test]
    fn rejects_garbage_expressions() {
        let now = Utc
            .with_ymd_and_hms(2026, 2, 17, 12, 0, 0)
            .single()
            .expect("valid now");
        assert!(parse_date_expr("not-a-date", now).is_err());
    }
}
