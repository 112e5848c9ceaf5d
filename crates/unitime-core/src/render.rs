use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Timelike, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::{format_project_date, format_project_datetime, format_project_time};
use crate::model::{EventType, ScheduleEvent, Subject, UserProfile};
use crate::subjects::resolve_name;
use crate::views::calendar::{DayCell, MonthGrid};
use crate::views::dashboard::greeting;
use crate::views::tasks::is_overdue;

const CELL_WIDTH: usize = 16;
const MAX_EVENTS_PER_CELL: usize = 3;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, events, subjects, now))]
    pub fn print_event_table(
        &mut self,
        events: &[ScheduleEvent],
        subjects: &[Subject],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if events.is_empty() {
            writeln!(out, "No events.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Type".to_string(),
            "Subject".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            let id = self.paint(&short_id(event), "33");
            let start = format_project_datetime(event.start_time);
            let end = format_project_time(event.end_time);
            let end = if is_overdue(event, now) {
                self.paint(&end, "31")
            } else {
                end
            };
            let subject = resolve_name(subjects, event.subject_id).unwrap_or_default();

            rows.push(vec![
                id,
                start,
                end,
                event.event_type.to_string(),
                subject,
                event.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, tasks, subjects, now))]
    pub fn print_task_table(
        &mut self,
        tasks: &[ScheduleEvent],
        subjects: &[Subject],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks found.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "St".to_string(),
            "Due".to_string(),
            "Pri".to_string(),
            "Type".to_string(),
            "Subject".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(&short_id(task), "33");
            let status = if task.is_completed { "x" } else { " " }.to_string();
            let due = format_project_datetime(task.end_time);
            let due = if is_overdue(task, now) {
                self.paint(&format!("{due} (overdue)"), "31")
            } else {
                due
            };
            let subject = resolve_name(subjects, task.subject_id).unwrap_or_default();

            rows.push(vec![
                id,
                status,
                due,
                task.priority.to_string(),
                task.event_type.to_string(),
                subject,
                task.title.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, subjects))]
    pub fn print_subject_table(&mut self, subjects: &[Subject]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if subjects.is_empty() {
            writeln!(out, "No subjects registered.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Code".to_string(),
            "Name".to_string(),
            "Location".to_string(),
            "Color".to_string(),
        ];

        let rows = subjects
            .iter()
            .map(|subject| {
                vec![
                    self.paint(&subject.id.to_string()[..8], "33"),
                    subject.code.clone(),
                    subject.name.clone(),
                    subject.location.clone().unwrap_or_default(),
                    subject.color.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, event, subjects))]
    pub fn print_event_info(
        &mut self,
        event: &ScheduleEvent,
        subjects: &[Subject],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id        {}", event.id)?;
        writeln!(out, "title     {}", event.title)?;
        writeln!(out, "type      {}", event.event_type)?;
        writeln!(out, "priority  {}", event.priority)?;
        writeln!(
            out,
            "status    {}",
            if event.is_completed { "completed" } else { "pending" }
        )?;
        writeln!(out, "start     {}", format_project_datetime(event.start_time))?;
        writeln!(out, "end       {}", format_project_datetime(event.end_time))?;

        if let Some(subject) = resolve_name(subjects, event.subject_id) {
            writeln!(out, "subject   {subject}")?;
        }
        if let Some(description) = &event.description {
            writeln!(out, "desc      {description}")?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_month_grid(&mut self, grid: &MonthGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let Some(first_week) = grid.weeks.first() else {
            return Ok(());
        };

        writeln!(out, "{}", grid.reference.format("%B %Y"))?;
        for cell in first_week {
            write!(
                out,
                "{:<width$} ",
                cell.date.format("%a").to_string(),
                width = CELL_WIDTH
            )?;
        }
        writeln!(out)?;

        for week in &grid.weeks {
            for _ in week {
                write!(out, "{:-<width$} ", "", width = CELL_WIDTH)?;
            }
            writeln!(out)?;

            for cell in week {
                let label = format!("{:>2}", cell.date.day());
                let label = if cell.is_today {
                    self.paint(&label, "7")
                } else if !cell.in_month {
                    self.paint(&label, "90")
                } else {
                    label
                };
                write_padded(&mut out, &label, CELL_WIDTH)?;
            }
            writeln!(out)?;

            let visible = |cell: &DayCell| cell.events.len().min(MAX_EVENTS_PER_CELL);
            let line_count = week.iter().map(visible).max().unwrap_or(0);
            for line_idx in 0..line_count {
                for cell in week {
                    let overflow = cell.events.len() > MAX_EVENTS_PER_CELL;
                    let text = if overflow && line_idx == MAX_EVENTS_PER_CELL - 1 {
                        format!("+{} more", cell.events.len() - (MAX_EVENTS_PER_CELL - 1))
                    } else if let Some(event) = cell.events.get(line_idx) {
                        truncate_to_width(
                            &format!(
                                "{} {}",
                                format_project_time(event.start_time),
                                event.title
                            ),
                            CELL_WIDTH,
                        )
                    } else {
                        String::new()
                    };

                    let text = if !cell.in_month {
                        self.paint(&text, "90")
                    } else {
                        text
                    };
                    write_padded(&mut out, &text, CELL_WIDTH)?;
                }
                writeln!(out)?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, strip))]
    pub fn print_week_strip(&mut self, strip: &[DayCell]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        for cell in strip {
            let heading = cell.date.format("%a %d/%m").to_string();
            let heading = if cell.is_today {
                self.paint(&heading, "7")
            } else {
                heading
            };
            writeln!(out, "{heading}")?;

            if cell.events.is_empty() {
                writeln!(out, "  -")?;
                continue;
            }
            for event in &cell.events {
                writeln!(
                    out,
                    "  {}-{}  {} ({})",
                    format_project_time(event.start_time),
                    format_project_time(event.end_time),
                    event.title,
                    event.event_type
                )?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, profile, upcoming, deadlines, counts, now))]
    pub fn print_dashboard(
        &mut self,
        profile: &UserProfile,
        upcoming: &[ScheduleEvent],
        deadlines: &[ScheduleEvent],
        counts: &[(EventType, usize)],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let local_hour = now.with_timezone(crate::datetime::project_timezone()).hour();
        writeln!(out, "{}, {}!", greeting(local_hour), profile.name)?;
        writeln!(
            out,
            "You have {} upcoming event(s) in the next 7 days.",
            upcoming.len()
        )?;
        writeln!(out)?;

        writeln!(out, "{}", self.paint("Upcoming", "1"))?;
        if upcoming.is_empty() {
            writeln!(out, "  Nothing coming up. Take a break!")?;
        }
        for event in upcoming {
            writeln!(
                out,
                "  {}  {}  {} ({})",
                format_project_date(event.start_time),
                format_project_time(event.start_time),
                event.title,
                event.event_type
            )?;
        }
        writeln!(out)?;

        writeln!(out, "{}", self.paint("Deadlines", "1"))?;
        if deadlines.is_empty() {
            writeln!(out, "  No pending deadlines.")?;
        }
        for event in deadlines {
            let due = format_project_date(event.end_time);
            let due = if is_overdue(event, now) {
                self.paint(&due, "31")
            } else {
                due
            };
            writeln!(out, "  {}  due {}", event.title, due)?;
        }
        writeln!(out)?;

        if !counts.is_empty() {
            let summary = counts
                .iter()
                .map(|(ty, count)| format!("{ty}: {count}"))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(out, "{}", self.paint("By type", "1"))?;
            writeln!(out, "  {summary}")?;
        }

        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn short_id(event: &ScheduleEvent) -> String {
    event.id.to_string()[..8].to_string()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn write_padded<W: Write>(mut writer: W, text: &str, width: usize) -> anyhow::Result<()> {
    let visible_width = UnicodeWidthStr::width(strip_ansi(text).as_str());
    let padding = width.saturating_sub(visible_width);
    write!(writer, "{}{} ", text, " ".repeat(padding))?;
    Ok(())
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width > max_width.saturating_sub(1) {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
