use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use gantry_shared::ImportedProject;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, EmployeeArgs, EmployeeCommand, ProjectArgs, TaskArgs, TaskCommand};
use crate::datetime::parse_work_pattern;
use crate::draft::{EmployeeDraft, ProjectDraft, TaskDraft};
use crate::frontend::{Frontend, Notice};
use crate::gateway::Gateway;
use crate::render::Renderer;
use crate::wizard::{Action, Step, Wizard};

/// Whether the wizard accepted the command. A rejected command has
/// already been reported through the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Rejected,
}

/// Prompts on stdin and prints notices on stdout.
#[derive(Debug)]
pub struct TerminalFrontend {
    renderer: Renderer,
    assume_yes: bool,
}

impl TerminalFrontend {
    pub fn new(renderer: Renderer, assume_yes: bool) -> Self {
        Self {
            renderer,
            assume_yes,
        }
    }
}

impl Frontend for TerminalFrontend {
    fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            debug!(prompt, "confirmation assumed by --yes");
            return true;
        }
        if !io::stdin().is_terminal() {
            warn!(prompt, "stdin is not a terminal; treating confirmation as declined");
            println!("{prompt} (declined; pass --yes to confirm non-interactively)");
            return false;
        }

        print!("{prompt} [y/N] ");
        if let Err(err) = io::stdout().flush() {
            warn!(error = %err, "failed to flush prompt");
        }
        let mut answer = String::new();
        if let Err(err) = io::stdin().lock().read_line(&mut answer) {
            warn!(error = %err, "failed to read confirmation");
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn notify(&mut self, notice: Notice) {
        if let Err(err) = self
            .renderer
            .print_notice(&mut io::stdout().lock(), &notice)
        {
            warn!(error = %err, "failed to print notice");
        }
    }
}

#[instrument(skip(wizard, renderer, out, command), fields(step = ?wizard.step()))]
pub async fn execute<G, F, W>(
    wizard: &mut Wizard<G, F>,
    renderer: &Renderer,
    out: &mut W,
    command: Option<Command>,
) -> anyhow::Result<Outcome>
where
    G: Gateway,
    F: Frontend,
    W: Write,
{
    let Some(command) = command else {
        return show_status(wizard, renderer, out);
    };
    debug!(?command, "dispatching command");

    match command {
        Command::Status => show_status(wizard, renderer, out),
        Command::Project(args) => {
            let draft = project_draft(wizard.project_form(), args);
            run(wizard, Action::CreateOrUpdateProject(draft)).await
        }
        Command::Employee(EmployeeCommand::Add(args)) => {
            let draft = employee_draft(wizard.employee_form(), args)?;
            let outcome = run(wizard, Action::AddEmployee(draft)).await?;
            list_after(outcome, || renderer.print_employees(out, wizard.store().employees()))
        }
        Command::Employee(EmployeeCommand::Edit { position }) => {
            let outcome = run(wizard, Action::EditEmployee(index(position)?)).await?;
            if outcome == Outcome::Done {
                let form = wizard.employee_form();
                writeln!(out, "name      {}", form.name)?;
                writeln!(out, "days      {}", form.work_pattern)?;
                writeln!(out, "holidays  {}", form.holidays)?;
                writeln!(out, "Run `gantry employee add` with any changed fields to save it.")?;
            }
            Ok(outcome)
        }
        Command::Employee(EmployeeCommand::Delete { position }) => {
            let outcome = run(wizard, Action::DeleteEmployee(index(position)?)).await?;
            list_after(outcome, || renderer.print_employees(out, wizard.store().employees()))
        }
        Command::Employee(EmployeeCommand::List) => {
            renderer.print_employees(out, wizard.store().employees())?;
            Ok(Outcome::Done)
        }
        Command::Task(TaskCommand::Add(args)) => {
            let draft = task_draft(wizard.task_form(), args);
            let outcome = run(wizard, Action::AddTask(draft)).await?;
            list_after(outcome, || renderer.print_tasks(out, wizard.store().tasks()))
        }
        Command::Task(TaskCommand::Edit { position }) => {
            let outcome = run(wizard, Action::EditTask(index(position)?)).await?;
            if outcome == Outcome::Done {
                let form = wizard.task_form();
                writeln!(out, "name         {}", form.name)?;
                writeln!(out, "assignee     {}", form.assigned_to)?;
                writeln!(out, "days         {}", form.estimated_duration)?;
                writeln!(out, "availability {}", form.availability)?;
                writeln!(out, "margin       {}", form.contingency_margin)?;
                writeln!(out, "depends on   {}", form.dependency)?;
                writeln!(out, "start        {}", form.custom_start_date)?;
                writeln!(out, "Run `gantry task add` with any changed fields to save it.")?;
            }
            Ok(outcome)
        }
        Command::Task(TaskCommand::Delete { position }) => {
            let outcome = run(wizard, Action::DeleteTask(index(position)?)).await?;
            list_after(outcome, || renderer.print_tasks(out, wizard.store().tasks()))
        }
        Command::Task(TaskCommand::List) => {
            renderer.print_tasks(out, wizard.store().tasks())?;
            Ok(Outcome::Done)
        }
        Command::Next => {
            let action = match wizard.step() {
                Step::CreateProject => {
                    Action::CreateOrUpdateProject(wizard.project_form().clone())
                }
                Step::ManageEmployees => Action::ProceedToTasks,
                Step::ManageTasks => Action::ProceedToSchedule,
                Step::ViewSchedule => {
                    return Err(anyhow!("already on the last step; try `gantry recompute`"));
                }
            };
            let outcome = run(wizard, action).await?;
            if outcome == Outcome::Done && wizard.step() == Step::ViewSchedule {
                show_chart(wizard, renderer, out)?;
            }
            Ok(outcome)
        }
        Command::Back => run(wizard, Action::GoBack).await,
        Command::Schedule => {
            let outcome = run(wizard, Action::ProceedToSchedule).await?;
            list_after(outcome, || show_chart(wizard, renderer, out))
        }
        Command::Recompute => {
            let outcome = run(wizard, Action::Recompute).await?;
            list_after(outcome, || show_chart(wizard, renderer, out))
        }
        Command::Show => {
            show_chart(wizard, renderer, out)?;
            Ok(Outcome::Done)
        }
        Command::Export { filename } => {
            run(wizard, Action::ExportSchedule(filename.unwrap_or_default())).await
        }
        Command::Import { path, json } => {
            let action = if json {
                Action::ImportBulk(read_import_json(&path)?)
            } else {
                Action::ImportFile(path)
            };
            let outcome = run(wizard, action).await?;
            list_after(outcome, || renderer.print_tasks(out, wizard.store().tasks()))
        }
        Command::Reset => run(wizard, Action::ResetAll).await,
    }
}

async fn run<G: Gateway, F: Frontend>(
    wizard: &mut Wizard<G, F>,
    action: Action,
) -> anyhow::Result<Outcome> {
    let label = action.label();
    match wizard.dispatch(action).await {
        Ok(()) => {
            info!(action = label, step = ?wizard.step(), "action applied");
            Ok(Outcome::Done)
        }
        Err(_) => Ok(Outcome::Rejected),
    }
}

fn list_after(
    outcome: Outcome,
    print: impl FnOnce() -> anyhow::Result<()>,
) -> anyhow::Result<Outcome> {
    if outcome == Outcome::Done {
        print()?;
    }
    Ok(outcome)
}

fn show_status<G: Gateway, F: Frontend, W: Write>(
    wizard: &Wizard<G, F>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<Outcome> {
    renderer.print_status(out, wizard.state())?;
    writeln!(out)?;
    match wizard.step() {
        Step::CreateProject => {
            writeln!(out, "Next: `gantry project --name NAME --start DATE`")?;
        }
        Step::ManageEmployees => renderer.print_employees(out, wizard.store().employees())?,
        Step::ManageTasks => renderer.print_tasks(out, wizard.store().tasks())?,
        Step::ViewSchedule => show_chart(wizard, renderer, out)?,
    }
    Ok(Outcome::Done)
}

fn show_chart<G: Gateway, F: Frontend, W: Write>(
    wizard: &Wizard<G, F>,
    renderer: &Renderer,
    out: &mut W,
) -> anyhow::Result<()> {
    match wizard.chart() {
        Some(grid) => renderer.print_chart(out, grid),
        None => {
            writeln!(out, "No schedule calculated yet")?;
            Ok(())
        }
    }
}

fn index(position: usize) -> anyhow::Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}

fn project_draft(form: &ProjectDraft, args: ProjectArgs) -> ProjectDraft {
    ProjectDraft {
        name: args.name.unwrap_or_else(|| form.name.clone()),
        start_date: args.start.unwrap_or_else(|| form.start_date.clone()),
        global_holidays: args
            .holidays
            .unwrap_or_else(|| form.global_holidays.clone()),
    }
}

fn employee_draft(form: &EmployeeDraft, args: EmployeeArgs) -> anyhow::Result<EmployeeDraft> {
    let work_pattern = match args.days {
        Some(raw) => parse_work_pattern(&raw)?,
        None => form.work_pattern,
    };
    Ok(EmployeeDraft {
        name: args.name.unwrap_or_else(|| form.name.clone()),
        work_pattern,
        holidays: args.holidays.unwrap_or_else(|| form.holidays.clone()),
    })
}

fn task_draft(form: &TaskDraft, args: TaskArgs) -> TaskDraft {
    TaskDraft {
        name: args.name.unwrap_or_else(|| form.name.clone()),
        assigned_to: args.assigned_to.unwrap_or_else(|| form.assigned_to.clone()),
        estimated_duration: args.estimated_duration.unwrap_or(form.estimated_duration),
        availability: args.availability.unwrap_or(form.availability),
        contingency_margin: args.contingency_margin.unwrap_or(form.contingency_margin),
        dependency: args.dependency.unwrap_or_else(|| form.dependency.clone()),
        custom_start_date: args
            .custom_start_date
            .unwrap_or_else(|| form.custom_start_date.clone()),
    }
}

#[instrument]
fn read_import_json(path: &Path) -> anyhow::Result<ImportedProject> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed parsing {}", path.display()))
}
