use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use gantry_shared::{Employee, Task};
use unicode_width::UnicodeWidthStr;

use crate::chart::{CellKind, ChartGrid, FIXED_COLUMNS};
use crate::config::Config;
use crate::datetime::format_date_list;
use crate::frontend::{Notice, Severity};
use crate::wizard::WizardState;

pub fn glyph(kind: CellKind) -> char {
    match kind {
        CellKind::Working => '█',
        CellKind::Holiday => '░',
        CellKind::Idle => '·',
    }
}

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

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, state))]
    pub fn print_status<W: Write>(&self, out: &mut W, state: &WizardState) -> anyhow::Result<()> {
        let step = self.paint(
            &format!("Step {}/4: {}", state.step.number(), state.step),
            "1",
        );
        writeln!(out, "{step}")?;

        match state.store.project() {
            Some(project) => {
                writeln!(out, "project     {}", project.name)?;
                writeln!(out, "start       {}", project.start_date.format("%Y-%m-%d"))?;
                if !project.global_holidays.is_empty() {
                    writeln!(
                        out,
                        "holidays    {}",
                        format_date_list(&project.global_holidays)
                    )?;
                }
            }
            None => writeln!(out, "project     (not created yet)")?,
        }

        writeln!(out, "employees   {}", state.store.employees().len())?;
        writeln!(out, "tasks       {}", state.store.tasks().len())?;
        let sync = if state.tracker.needs_sync() {
            self.paint("pending", "33")
        } else {
            "up to date".to_string()
        };
        writeln!(out, "submission  {sync}")?;

        if let Some(schedule) = &state.schedule {
            writeln!(
                out,
                "schedule    {} -> {}",
                schedule.start_date.format("%Y-%m-%d"),
                schedule.last_day().format("%Y-%m-%d")
            )?;
        }
        if !state.employee_form.name.is_empty() {
            writeln!(out, "editing     employee \"{}\"", state.employee_form.name)?;
        }
        if !state.task_form.name.is_empty() {
            writeln!(out, "editing     task \"{}\"", state.task_form.name)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, employees))]
    pub fn print_employees<W: Write>(
        &self,
        out: &mut W,
        employees: &[Employee],
    ) -> anyhow::Result<()> {
        if employees.is_empty() {
            writeln!(out, "No employees added yet")?;
            return Ok(());
        }

        let headers = ["#", "Name", "Working Days", "Holidays"].map(String::from);
        let rows = employees
            .iter()
            .enumerate()
            .map(|(idx, emp)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    emp.name.clone(),
                    emp.work_pattern.to_string(),
                    format_date_list(&emp.holidays),
                ]
            })
            .collect();

        write_table(out, vec![headers.to_vec()], rows)
    }

    #[tracing::instrument(skip(self, out, tasks))]
    pub fn print_tasks<W: Write>(&self, out: &mut W, tasks: &[Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks added yet")?;
            return Ok(());
        }

        let headers = [
            "#",
            "Task",
            "Assigned To",
            "Days",
            "Avail.",
            "Margin",
            "Depends On",
            "Start",
        ]
        .map(String::from);
        let rows = tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    task.name.clone(),
                    task.assigned_to.clone(),
                    task.estimated_duration.to_string(),
                    format!("{}%", task.availability),
                    task.contingency_margin.to_string(),
                    task.dependency.clone().unwrap_or_default(),
                    task.custom_start_date
                        .map(|date| date.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                ]
            })
            .collect();

        write_table(out, vec![headers.to_vec()], rows)
    }

    /// Two header lines (`M/D` then the weekday letter) over one glyph per
    /// day.
    #[tracing::instrument(skip(self, out, grid), fields(rows = grid.rows.len(), days = grid.days.len()))]
    pub fn print_chart<W: Write>(&self, out: &mut W, grid: &ChartGrid) -> anyhow::Result<()> {
        if grid.is_empty() {
            writeln!(out, "No tasks scheduled")?;
            return Ok(());
        }

        let mut labels: Vec<String> = FIXED_COLUMNS.iter().map(|h| h.to_string()).collect();
        let mut letters = vec![String::new(); FIXED_COLUMNS.len()];
        for day in &grid.days {
            labels.push(day.label.clone());
            letters.push(day.weekday.to_string());
        }

        let rows = grid
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.fixed.to_vec();
                cells.extend(row.cells.iter().map(|kind| self.paint_cell(*kind)));
                cells
            })
            .collect();

        write_table(&mut *out, vec![labels, letters], rows)?;
        writeln!(
            out,
            "{} working  {} holiday  {} idle",
            self.paint_cell(CellKind::Working),
            self.paint_cell(CellKind::Holiday),
            self.paint_cell(CellKind::Idle)
        )?;
        Ok(())
    }

    pub fn print_notice<W: Write>(&self, out: &mut W, notice: &Notice) -> io::Result<()> {
        let code = match notice.severity {
            Severity::Success => "32",
            Severity::Error => "31",
            Severity::Info => "36",
        };
        writeln!(out, "{}", self.paint(&notice.text, code))
    }

    fn paint_cell(&self, kind: CellKind) -> String {
        let code = match kind {
            CellKind::Working => "34",
            CellKind::Holiday => "31",
            CellKind::Idle => "2",
        };
        self.paint(&glyph(kind).to_string(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<Vec<String>>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.first().map(Vec::len).unwrap_or_default();
    let mut widths = vec![0usize; column_count];

    for header in &headers {
        for (idx, cell) in header.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(cell.as_str()));
        }
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for header in &headers {
        write_row(&mut writer, header, &widths)?;
    }

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in &rows {
        write_row(&mut writer, row, &widths)?;
    }

    Ok(())
}

fn write_row<W: Write>(writer: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    for (idx, width) in widths.iter().enumerate() {
        let cell = cells.get(idx).map(String::as_str).unwrap_or_default();
        let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
        let padding = width.saturating_sub(visible_width);
        write!(writer, "{}{} ", cell, " ".repeat(padding))?;
    }
    writeln!(writer)
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
