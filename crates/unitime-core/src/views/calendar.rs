use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

pub use crate::datetime::{Direction, Granularity, advance_period};
use crate::datetime::{start_of_week, to_project_date};
use crate::model::ScheduleEvent;

#[derive(Debug, Clone)]
pub struct DayCell {
    pub date: NaiveDate,
    /// False for the lead/trail days borrowed from adjacent months.
    pub in_month: bool,
    pub is_today: bool,
    pub events: Vec<ScheduleEvent>,
}

#[derive(Debug, Clone)]
pub struct MonthGrid {
    pub reference: NaiveDate,
    pub weeks: Vec<Vec<DayCell>>,
}

/// Lay out the month containing `reference` as complete display weeks: from
/// the week holding the 1st through the week holding the last day. Events
/// land on the cell matching the project-timezone calendar day of their
/// start time; their order within a cell follows the input.
pub fn month_grid(
    reference: NaiveDate,
    events: &[ScheduleEvent],
    week_start: Weekday,
    today: NaiveDate,
) -> MonthGrid {
    let month_start = reference.with_day(1).unwrap_or(reference);
    let month_end = last_day_of_month(month_start);
    let grid_start = start_of_week(month_start, week_start);
    let grid_end = start_of_week(month_end, week_start) + Duration::days(6);

    let mut weeks = Vec::new();
    let mut week: Vec<DayCell> = Vec::with_capacity(7);
    let mut day = grid_start;
    while day <= grid_end {
        week.push(day_cell(day, month_start, today, events));
        if week.len() == 7 {
            weeks.push(week);
            week = Vec::with_capacity(7);
        }
        day += Duration::days(1);
    }

    MonthGrid { reference, weeks }
}

/// The seven cells of the displayed week containing `reference`. Cells are
/// always "in month" here; the strip is its own display period.
pub fn week_strip(
    reference: NaiveDate,
    events: &[ScheduleEvent],
    week_start: Weekday,
    today: NaiveDate,
) -> Vec<DayCell> {
    let strip_start = start_of_week(reference, week_start);
    (0..7)
        .map(|offset| {
            let date = strip_start + Duration::days(offset);
            day_cell(date, date, today, events)
        })
        .collect()
}

fn day_cell(
    date: NaiveDate,
    month_start: NaiveDate,
    today: NaiveDate,
    events: &[ScheduleEvent],
) -> DayCell {
    DayCell {
        date,
        in_month: date.year() == month_start.year() && date.month() == month_start.month(),
        is_today: date == today,
        events: events
            .iter()
            .filter(|event| to_project_date(event.start_time) == date)
            .cloned()
            .collect(),
    }
}

fn last_day_of_month(month_start: NaiveDate) -> NaiveDate {
    month_start
        .checked_add_months(Months::new(1))
        .map(|next| next - Duration::days(1))
        .unwrap_or(month_start)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, NaiveDate, Weekday};
    use uuid::Uuid;

    use super::{month_grid, week_strip};
    use crate::datetime::project_time_on;
    use crate::model::{EventType, Priority, ScheduleEvent};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event_on(date: NaiveDate, title: &str) -> ScheduleEvent {
        let start = project_time_on(date, 12, 0).expect("valid wall clock");
        ScheduleEvent {
            id: Uuid::new_v4(),
            subject_id: None,
            title: title.to_string(),
            description: None,
            start_time: start,
            // A multi-day span must not leak the event into later cells.
            end_time: start + Duration::days(3),
            event_type: EventType::Class,
            priority: Priority::Medium,
            is_completed: false,
        }
    }

    #[test]
    fn grid_is_complete_weeks_bracketing_the_month() {
        let reference = day(2026, 3, 15);
        let grid = month_grid(reference, &[], Weekday::Mon, day(2026, 3, 15));

        assert!(!grid.weeks.is_empty());
        for week in &grid.weeks {
            assert_eq!(week.len(), 7);
        }

        let first = grid.weeks[0][0].date;
        let last = grid.weeks[grid.weeks.len() - 1][6].date;
        assert!(first <= day(2026, 3, 1));
        assert!(last >= day(2026, 3, 31));

        let in_month: usize = grid
            .weeks
            .iter()
            .flatten()
            .filter(|cell| cell.in_month)
            .count();
        assert_eq!(in_month, 31);
    }

    #[test]
    fn four_week_february_has_no_padding_days() {
        // February 2021 starts on a Monday and has exactly 28 days.
        let grid = month_grid(day(2021, 2, 10), &[], Weekday::Mon, day(2021, 2, 10));
        assert_eq!(grid.weeks.len(), 4);
        assert!(grid.weeks.iter().flatten().all(|cell| cell.in_month));
    }

    #[test]
    fn event_lands_on_exactly_one_cell() {
        let target = day(2026, 3, 10);
        let events = vec![event_on(target, "Thi giua ky")];
        let grid = month_grid(day(2026, 3, 1), &events, Weekday::Mon, day(2026, 3, 1));

        let mut holding_cells = 0;
        for cell in grid.weeks.iter().flatten() {
            if cell.date == target {
                assert_eq!(cell.events.len(), 1);
                holding_cells += 1;
            } else {
                assert!(cell.events.is_empty(), "leaked into {}", cell.date);
            }
        }
        assert_eq!(holding_cells, 1);
    }

    #[test]
    fn cell_event_order_follows_input() {
        let target = day(2026, 3, 10);
        let events = vec![
            event_on(target, "second entered later"),
            event_on(target, "first entered earlier"),
        ];
        let grid = month_grid(day(2026, 3, 1), &events, Weekday::Mon, day(2026, 3, 1));

        let cell = grid
            .weeks
            .iter()
            .flatten()
            .find(|cell| cell.date == target)
            .expect("target cell");
        assert_eq!(cell.events[0].title, "second entered later");
        assert_eq!(cell.events[1].title, "first entered earlier");
    }

    #[test]
    fn today_flag_marks_a_single_cell() {
        let today = day(2026, 3, 18);
        let grid = month_grid(day(2026, 3, 1), &[], Weekday::Mon, today);
        let marked: Vec<_> = grid
            .weeks
            .iter()
            .flatten()
            .filter(|cell| cell.is_today)
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].date, today);
    }

    #[test]
    fn week_strip_starts_on_configured_day() {
        // 2026-03-04 is a Wednesday.
        let strip = week_strip(day(2026, 3, 4), &[], Weekday::Mon, day(2026, 3, 4));
        assert_eq!(strip.len(), 7);
        assert_eq!(strip[0].date, day(2026, 3, 2));
        assert_eq!(strip[0].date.weekday(), Weekday::Mon);
        assert_eq!(strip[6].date, day(2026, 3, 8));
    }
}
