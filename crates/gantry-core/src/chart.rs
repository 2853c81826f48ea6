//! Calendar grid for a computed schedule.
//!
//! Columns are a fixed header block followed by one column per calendar
//! day of the schedule window. Rows are tasks ordered by start date, with
//! undated tasks last. Every day cell is classified as working, holiday or
//! idle, with working taking precedence over holiday.

use chrono::{Datelike, NaiveDate, Weekday};
use gantry_shared::{Schedule, ScheduledTask};

use crate::datetime::days_inclusive;

pub const FIXED_COLUMNS: [&str; 6] = [
    "Task",
    "Assigned To",
    "Est. Days",
    "Actual Days",
    "Start Date",
    "End Date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Working,
    Holiday,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayColumn {
    pub date: NaiveDate,
    /// `month/day`, e.g. `1/5`.
    pub label: String,
    /// One-letter weekday, Sunday-first `S M T W T F S`.
    pub weekday: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow {
    pub fixed: [String; 6],
    pub cells: Vec<CellKind>,
}

impl ChartRow {
    pub fn name(&self) -> &str {
        &self.fixed[0]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartGrid {
    pub days: Vec<DayColumn>,
    pub rows: Vec<ChartRow>,
}

impl ChartGrid {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[tracing::instrument(skip(tasks), fields(tasks = tasks.len()))]
pub fn render_chart(start: NaiveDate, end: NaiveDate, tasks: &[ScheduledTask]) -> ChartGrid {
    let days: Vec<DayColumn> = days_inclusive(start, end).map(day_column).collect();

    let mut ordered: Vec<&ScheduledTask> = tasks.iter().collect();
    ordered.sort_by_key(|task| (task.start_date.is_none(), task.start_date));

    let rows = ordered
        .into_iter()
        .map(|task| ChartRow {
            fixed: fixed_columns(task),
            cells: days.iter().map(|day| classify(task, day.date)).collect(),
        })
        .collect();

    tracing::debug!(days = days.len(), "rendered chart grid");
    ChartGrid { days, rows }
}

pub fn render_schedule(schedule: &Schedule) -> ChartGrid {
    render_chart(schedule.start_date, schedule.last_day(), &schedule.tasks)
}

fn classify(task: &ScheduledTask, day: NaiveDate) -> CellKind {
    if task.working_dates.contains(&day) {
        CellKind::Working
    } else if task.holiday_dates.contains(&day) {
        CellKind::Holiday
    } else {
        CellKind::Idle
    }
}

fn fixed_columns(task: &ScheduledTask) -> [String; 6] {
    let date = |value: Option<NaiveDate>| {
        value
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    [
        task.name.clone(),
        task.assigned_to.clone(),
        task.estimated_duration.to_string(),
        task.actual_duration.to_string(),
        date(task.start_date),
        date(task.end_date),
    ]
}

fn day_column(date: NaiveDate) -> DayColumn {
    let weekday = match date.weekday() {
        Weekday::Sun | Weekday::Sat => 'S',
        Weekday::Mon => 'M',
        Weekday::Tue | Weekday::Thu => 'T',
        Weekday::Wed => 'W',
        Weekday::Fri => 'F',
    };
    DayColumn {
        date,
        label: format!("{}/{}", date.month(), date.day()),
        weekday,
    }
}
