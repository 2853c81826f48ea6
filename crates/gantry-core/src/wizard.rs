//! The four-step project wizard.
//!
//! `CreateProject -> ManageEmployees -> ManageTasks -> ViewSchedule`.
//! The wizard owns the entity store and the sync tracker and is their only
//! mutator. Remote calls are issued one at a time; the tracker is marked
//! synced only after the last required submission succeeded, so any
//! failure leaves the session flagged for resubmission.

use std::fmt;
use std::path::{Path, PathBuf};

use gantry_shared::{ImportedProject, Schedule};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::chart::{ChartGrid, render_schedule};
use crate::draft::{EmployeeDraft, ProjectDraft, TaskDraft};
use crate::error::{Operation, WizardError};
use crate::frontend::{Frontend, Notice};
use crate::gateway::Gateway;
use crate::session::write_atomic;
use crate::store::EntityStore;
use crate::tracker::SyncTracker;

pub const RESET_PROMPT: &str =
    "Are you sure you want to start a new project? All current data will be lost.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Step {
    #[default]
    CreateProject,
    ManageEmployees,
    ManageTasks,
    ViewSchedule,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::CreateProject => 1,
            Step::ManageEmployees => 2,
            Step::ManageTasks => 3,
            Step::ViewSchedule => 4,
        }
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::CreateProject => None,
            Step::ManageEmployees => Some(Step::CreateProject),
            Step::ManageTasks => Some(Step::ManageEmployees),
            Step::ViewSchedule => Some(Step::ManageTasks),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            Step::CreateProject => "Project",
            Step::ManageEmployees => "Employees",
            Step::ManageTasks => "Tasks",
            Step::ViewSchedule => "Schedule",
        };
        f.write_str(title)
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    CreateOrUpdateProject(ProjectDraft),
    AddEmployee(EmployeeDraft),
    EditEmployee(usize),
    DeleteEmployee(usize),
    AddTask(TaskDraft),
    EditTask(usize),
    DeleteTask(usize),
    ProceedToTasks,
    GoBack,
    ProceedToSchedule,
    Recompute,
    ImportBulk(ImportedProject),
    ImportFile(PathBuf),
    ExportSchedule(String),
    ResetAll,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::CreateOrUpdateProject(_) => "create_or_update_project",
            Action::AddEmployee(_) => "add_employee",
            Action::EditEmployee(_) => "edit_employee",
            Action::DeleteEmployee(_) => "delete_employee",
            Action::AddTask(_) => "add_task",
            Action::EditTask(_) => "edit_task",
            Action::DeleteTask(_) => "delete_task",
            Action::ProceedToTasks => "proceed_to_tasks",
            Action::GoBack => "go_back",
            Action::ProceedToSchedule => "proceed_to_schedule",
            Action::Recompute => "recompute",
            Action::ImportBulk(_) => "import_bulk",
            Action::ImportFile(_) => "import_file",
            Action::ExportSchedule(_) => "export_schedule",
            Action::ResetAll => "reset_all",
        }
    }
}

/// Everything that survives between two invocations of the wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardState {
    pub step: Step,
    pub store: EntityStore,
    pub tracker: SyncTracker,
    pub project_form: ProjectDraft,
    pub employee_form: EmployeeDraft,
    pub task_form: TaskDraft,
    pub schedule: Option<Schedule>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: Step::default(),
            store: EntityStore::new(),
            tracker: SyncTracker::new(),
            project_form: ProjectDraft::with_defaults(),
            employee_form: EmployeeDraft::default(),
            task_form: TaskDraft::default(),
            schedule: None,
        }
    }
}

pub struct Wizard<G, F> {
    state: WizardState,
    chart: Option<ChartGrid>,
    gateway: G,
    frontend: F,
    export_dir: PathBuf,
}

impl<G: Gateway, F: Frontend> Wizard<G, F> {
    pub fn new(gateway: G, frontend: F) -> Self {
        Self::restore(WizardState::default(), gateway, frontend)
    }

    /// Resumes a saved session. The chart is rebuilt from the stored
    /// schedule.
    pub fn restore(state: WizardState, gateway: G, frontend: F) -> Self {
        let chart = state.schedule.as_ref().map(render_schedule);
        Self {
            state,
            chart,
            gateway,
            frontend,
            export_dir: PathBuf::from("."),
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn store(&self) -> &EntityStore {
        &self.state.store
    }

    pub fn tracker(&self) -> &SyncTracker {
        &self.state.tracker
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.state.schedule.as_ref()
    }

    pub fn chart(&self) -> Option<&ChartGrid> {
        self.chart.as_ref()
    }

    pub fn project_form(&self) -> &ProjectDraft {
        &self.state.project_form
    }

    pub fn employee_form(&self) -> &EmployeeDraft {
        &self.state.employee_form
    }

    pub fn task_form(&self) -> &TaskDraft {
        &self.state.task_form
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    /// Runs one user action. Failures are shown to the user as an error
    /// notice and returned; the wizard stays on its current step.
    #[instrument(skip(self, action), fields(action = action.label(), step = ?self.state.step))]
    pub async fn dispatch(&mut self, action: Action) -> Result<(), WizardError> {
        let label = action.label();
        let result = match action {
            Action::CreateOrUpdateProject(draft) => self.create_or_update_project(draft).await,
            Action::AddEmployee(draft) => self.add_employee(draft),
            Action::EditEmployee(index) => self.edit_employee(index),
            Action::DeleteEmployee(index) => self.delete_employee(index),
            Action::AddTask(draft) => self.add_task(draft),
            Action::EditTask(index) => self.edit_task(index),
            Action::DeleteTask(index) => self.delete_task(index),
            Action::ProceedToTasks => self.proceed_to_tasks(),
            Action::GoBack => {
                self.go_back();
                Ok(())
            }
            Action::ProceedToSchedule => self.proceed_to_schedule().await,
            Action::Recompute => self.recompute().await,
            Action::ImportBulk(imported) => self.import_bulk(imported).await,
            Action::ImportFile(path) => self.import_file(&path).await,
            Action::ExportSchedule(filename) => self.export_schedule(&filename).await.map(|_| ()),
            Action::ResetAll => self.reset_all().await,
        };

        if let Err(err) = &result {
            warn!(action = label, step = ?self.state.step, error = %err, "action failed");
            self.frontend.notify(Notice::error(err.to_string()));
        }
        result
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_or_update_project(
        &mut self,
        draft: ProjectDraft,
    ) -> Result<(), WizardError> {
        self.require_step("Creating the project", Step::CreateProject)?;
        self.state.project_form = draft;
        let project = self.state.project_form.validate()?;

        self.gateway
            .create_project(&project)
            .await
            .map_err(|err| WizardError::from_gateway(Operation::CreateProject, err))?;

        let was_update = self.state.tracker.project_exists();
        self.state.store.set_project(project);
        self.state
            .tracker
            .mark_project_created(was_update, self.state.store.has_entities());
        self.state.step = Step::ManageEmployees;

        info!(was_update, "project submitted");
        self.frontend.notify(Notice::success(if was_update {
            "Project updated successfully!"
        } else {
            "Project created successfully!"
        }));
        Ok(())
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub fn add_employee(&mut self, draft: EmployeeDraft) -> Result<(), WizardError> {
        self.require_step("Adding employees", Step::ManageEmployees)?;
        self.state.employee_form = draft;
        let employee = self.state.employee_form.validate()?;
        let name = employee.name.clone();

        self.state.store.add_employee(employee)?;
        self.state.tracker.mark_entity_mutated();
        self.state.employee_form = EmployeeDraft::default();

        self.frontend
            .notify(Notice::success(format!("Employee \"{name}\" added!")));
        Ok(())
    }

    /// Pulls the employee out of the list and into the form. It only
    /// comes back when the form is submitted again.
    #[instrument(skip(self))]
    pub fn edit_employee(&mut self, index: usize) -> Result<(), WizardError> {
        self.require_step("Editing employees", Step::ManageEmployees)?;
        let employee = self.state.store.remove_employee(index)?;
        self.state.employee_form = EmployeeDraft::from_employee(&employee);
        self.state.tracker.mark_entity_mutated();

        self.frontend.notify(Notice::info(format!(
            "Editing employee \"{}\"; submit it again to keep it",
            employee.name
        )));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_employee(&mut self, index: usize) -> Result<(), WizardError> {
        self.require_step("Deleting employees", Step::ManageEmployees)?;
        let name = self
            .state
            .store
            .employees()
            .get(index)
            .map(|emp| emp.name.clone())
            .ok_or_else(|| missing("employee", index))?;

        if !self
            .frontend
            .confirm(&format!("Delete employee \"{name}\"?"))
        {
            debug!(%name, "employee deletion declined");
            return Ok(());
        }

        self.state.store.remove_employee(index)?;
        self.state.tracker.mark_entity_mutated();
        self.frontend
            .notify(Notice::success(format!("Employee \"{name}\" deleted")));
        Ok(())
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub fn add_task(&mut self, draft: TaskDraft) -> Result<(), WizardError> {
        self.require_step("Adding tasks", Step::ManageTasks)?;
        self.state.task_form = draft;
        let task = self.state.task_form.validate()?;
        let name = task.name.clone();

        self.state.store.add_task(task)?;
        self.state.tracker.mark_entity_mutated();
        self.state.task_form = TaskDraft::default();

        self.frontend
            .notify(Notice::success(format!("Task \"{name}\" added!")));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn edit_task(&mut self, index: usize) -> Result<(), WizardError> {
        self.require_step("Editing tasks", Step::ManageTasks)?;
        let task = self.state.store.remove_task(index)?;
        self.state.task_form = TaskDraft::from_task(&task);
        self.state.tracker.mark_entity_mutated();

        self.frontend.notify(Notice::info(format!(
            "Editing task \"{}\"; submit it again to keep it",
            task.name
        )));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_task(&mut self, index: usize) -> Result<(), WizardError> {
        self.require_step("Deleting tasks", Step::ManageTasks)?;
        let name = self
            .state
            .store
            .tasks()
            .get(index)
            .map(|task| task.name.clone())
            .ok_or_else(|| missing("task", index))?;

        if !self.frontend.confirm(&format!("Delete task \"{name}\"?")) {
            debug!(%name, "task deletion declined");
            return Ok(());
        }

        self.state.store.remove_task(index)?;
        self.state.tracker.mark_entity_mutated();
        self.frontend
            .notify(Notice::success(format!("Task \"{name}\" deleted")));
        Ok(())
    }

    pub fn proceed_to_tasks(&mut self) -> Result<(), WizardError> {
        self.require_step("Moving on to tasks", Step::ManageEmployees)?;
        if self.state.store.employees().is_empty() {
            return Err(WizardError::validation("Please add at least one employee"));
        }
        self.state.step = Step::ManageTasks;
        Ok(())
    }

    pub fn go_back(&mut self) {
        if let Some(previous) = self.state.step.previous() {
            debug!(from = ?self.state.step, to = ?previous, "stepping back");
            self.state.step = previous;
        }
    }

    #[instrument(skip(self))]
    pub async fn proceed_to_schedule(&mut self) -> Result<(), WizardError> {
        self.require_step("Calculating the schedule", Step::ManageTasks)?;
        self.submit_and_compute().await?;
        self.state.step = Step::ViewSchedule;
        self.frontend
            .notify(Notice::success("Schedule calculated successfully!"));
        Ok(())
    }

    /// Resubmits everything unconditionally and recomputes, staying on
    /// the schedule view.
    #[instrument(skip(self))]
    pub async fn recompute(&mut self) -> Result<(), WizardError> {
        self.require_step("Recalculating", Step::ViewSchedule)?;
        self.state.tracker.mark_entity_mutated();
        self.submit_and_compute().await?;
        self.frontend
            .notify(Notice::success("Schedule recalculated successfully!"));
        Ok(())
    }

    async fn submit_and_compute(&mut self) -> Result<(), WizardError> {
        if self.state.store.employees().is_empty() {
            return Err(WizardError::validation("Please add at least one employee"));
        }
        if self.state.store.tasks().is_empty() {
            return Err(WizardError::validation("Please add at least one task"));
        }

        if self.state.tracker.needs_sync() {
            self.gateway
                .replace_employees(self.state.store.employees())
                .await
                .map_err(|err| WizardError::from_gateway(Operation::ReplaceEmployees, err))?;
            self.gateway
                .replace_tasks(self.state.store.tasks())
                .await
                .map_err(|err| WizardError::from_gateway(Operation::ReplaceTasks, err))?;
            self.state.tracker.mark_synced();
            info!(
                employees = self.state.store.employees().len(),
                tasks = self.state.store.tasks().len(),
                "entity lists submitted"
            );
        } else {
            debug!("entity lists unchanged since last submission");
        }

        self.gateway
            .compute_schedule()
            .await
            .map_err(|err| WizardError::from_gateway(Operation::ComputeSchedule, err))?;
        let schedule = self
            .gateway
            .fetch_schedule()
            .await
            .map_err(|err| WizardError::from_gateway(Operation::FetchSchedule, err))?;

        self.chart = Some(render_schedule(&schedule));
        self.state.schedule = Some(schedule);
        Ok(())
    }

    /// Replaces the session with imported data, pushes it to the service
    /// and lands on the task list for review.
    #[instrument(skip(self, imported), fields(
        employees = imported.employees.len(),
        tasks = imported.tasks.len()
    ))]
    pub async fn import_bulk(&mut self, imported: ImportedProject) -> Result<(), WizardError> {
        let ImportedProject {
            project_info,
            employees,
            tasks,
        } = imported;

        self.state
            .store
            .replace_all(project_info.clone(), employees, tasks)?;
        self.state.tracker.mark_entity_mutated();
        self.state.project_form = ProjectDraft::from_config(&project_info);
        self.state.employee_form = EmployeeDraft::default();
        self.state.task_form = TaskDraft::default();
        self.state.schedule = None;
        self.chart = None;

        self.gateway
            .create_project(&project_info)
            .await
            .map_err(|err| WizardError::from_gateway(Operation::CreateProject, err))?;
        self.gateway
            .replace_employees(self.state.store.employees())
            .await
            .map_err(|err| WizardError::from_gateway(Operation::ReplaceEmployees, err))?;
        self.gateway
            .replace_tasks(self.state.store.tasks())
            .await
            .map_err(|err| WizardError::from_gateway(Operation::ReplaceTasks, err))?;

        self.state
            .tracker
            .mark_project_created(false, self.state.store.has_entities());
        self.state.tracker.mark_synced();
        self.state.step = Step::ManageTasks;

        self.frontend.notify(Notice::success(format!(
            "Imported {} employee(s) and {} task(s)",
            self.state.store.employees().len(),
            self.state.store.tasks().len()
        )));
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn import_file(&mut self, path: &Path) -> Result<(), WizardError> {
        let contents = std::fs::read(path)
            .map_err(|err| WizardError::io(format!("failed to read {}", path.display()), err))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.xlsx".to_string());

        let imported = self
            .gateway
            .import_project(&file_name, contents)
            .await
            .map_err(|err| WizardError::from_gateway(Operation::ImportProject, err))?;
        self.import_bulk(imported).await
    }

    /// Writes the service's workbook for the current schedule into the
    /// export directory and returns its path.
    #[instrument(skip(self))]
    pub async fn export_schedule(&mut self, filename: &str) -> Result<PathBuf, WizardError> {
        self.require_step("Exporting", Step::ViewSchedule)?;
        let project_name = self
            .state
            .schedule
            .as_ref()
            .ok_or_else(|| WizardError::validation("Calculate the schedule before exporting"))?
            .project_name
            .clone()
            .or_else(|| self.state.store.project().map(|p| p.name.clone()));

        let file_name = export_file_name(filename, project_name.as_deref());
        let bytes = self
            .gateway
            .export_schedule(&file_name)
            .await
            .map_err(|err| WizardError::from_gateway(Operation::ExportSchedule, err))?;

        let target = self.export_dir.join(&file_name);
        write_atomic(&target, &bytes)
            .map_err(|err| WizardError::io(format!("failed to write {}", target.display()), err))?;

        info!(path = %target.display(), size = bytes.len(), "schedule exported");
        self.frontend.notify(Notice::success(format!(
            "Excel file saved to {}",
            target.display()
        )));
        Ok(target)
    }

    /// Starts over after confirmation. The remote reset is best-effort.
    #[instrument(skip(self))]
    pub async fn reset_all(&mut self) -> Result<(), WizardError> {
        if !self.frontend.confirm(RESET_PROMPT) {
            debug!("reset declined");
            return Ok(());
        }

        if let Err(err) = self.gateway.reset_project().await {
            let err = WizardError::from_gateway(Operation::ResetProject, err);
            warn!(
                operation = %Operation::ResetProject,
                error = %err,
                "remote reset failed; clearing local session anyway"
            );
        }

        self.state.store.clear();
        self.state.tracker.reset();
        self.state.project_form = ProjectDraft::with_defaults();
        self.state.employee_form = EmployeeDraft::default();
        self.state.task_form = TaskDraft::default();
        self.state.schedule = None;
        self.state.step = Step::CreateProject;
        self.chart = None;
        self.frontend
            .notify(Notice::success("Project reset successfully!"));
        Ok(())
    }

    fn require_step(&self, what: &str, allowed: Step) -> Result<(), WizardError> {
        if self.state.step == allowed {
            return Ok(());
        }
        Err(WizardError::validation(format!(
            "{what} is only available on the {allowed} step (current step: {})",
            self.state.step
        )))
    }
}

fn missing(kind: &str, index: usize) -> WizardError {
    WizardError::validation(format!("No {kind} at position {}", index.saturating_add(1)))
}

/// Empty means `<project>_gantt.xlsx`; `.xlsx` is appended when missing
/// and path separators are replaced.
pub fn export_file_name(requested: &str, project_name: Option<&str>) -> String {
    let requested = requested.trim();
    let name = if requested.is_empty() {
        let project = project_name.unwrap_or("gantt_chart").replace(' ', "_");
        format!("{project}_gantt.xlsx")
    } else if requested.ends_with(".xlsx") {
        requested.to_string()
    } else {
        format!("{requested}.xlsx")
    };
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::{Step, export_file_name};

    #[test]
    fn export_names_follow_service_conventions() {
        assert_eq!(export_file_name("", Some("Big Launch")), "Big_Launch_gantt.xlsx");
        assert_eq!(export_file_name("  plan ", None), "plan.xlsx");
        assert_eq!(export_file_name("plan.xlsx", None), "plan.xlsx");
        assert_eq!(export_file_name("../etc/plan", None), ".._etc_plan.xlsx");
        assert_eq!(export_file_name("", None), "gantt_chart_gantt.xlsx");
    }

    #[test]
    fn steps_walk_back_to_the_project() {
        assert_eq!(Step::ViewSchedule.previous(), Some(Step::ManageTasks));
        assert_eq!(Step::ManageEmployees.previous(), Some(Step::CreateProject));
        assert_eq!(Step::CreateProject.previous(), None);
        assert_eq!(Step::ManageTasks.number(), 3);
    }
}
