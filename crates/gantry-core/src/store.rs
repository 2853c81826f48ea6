use gantry_shared::{Employee, ProjectConfig, Task};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WizardError;

/// Everything the user entered in the current session, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    project: Option<ProjectConfig>,
    employees: Vec<Employee>,
    tasks: Vec<Task>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self) -> Option<&ProjectConfig> {
        self.project.as_ref()
    }

    pub fn employees(&self) -> &[Employee] {
        &self.employees
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn has_entities(&self) -> bool {
        !self.employees.is_empty() || !self.tasks.is_empty()
    }

    pub fn set_project(&mut self, project: ProjectConfig) {
        self.project = Some(project);
    }

    pub fn employee_exists(&self, name: &str) -> bool {
        self.employees.iter().any(|emp| emp.name == name)
    }

    pub fn task_exists(&self, name: &str) -> bool {
        self.tasks.iter().any(|task| task.name == name)
    }

    pub fn add_employee(&mut self, employee: Employee) -> Result<(), WizardError> {
        if self.employee_exists(&employee.name) {
            return Err(WizardError::validation(format!(
                "Employee \"{}\" already exists",
                employee.name
            )));
        }
        debug!(name = %employee.name, "employee added");
        self.employees.push(employee);
        Ok(())
    }

    pub fn remove_employee(&mut self, index: usize) -> Result<Employee, WizardError> {
        if index >= self.employees.len() {
            return Err(out_of_range("employee", index, self.employees.len()));
        }
        Ok(self.employees.remove(index))
    }

    /// Rejects duplicate names, unknown assignees, and dependencies that do
    /// not name another task already in the list.
    pub fn add_task(&mut self, task: Task) -> Result<(), WizardError> {
        if self.task_exists(&task.name) {
            return Err(WizardError::validation(format!(
                "Task \"{}\" already exists",
                task.name
            )));
        }
        if !self.employee_exists(&task.assigned_to) {
            return Err(WizardError::validation(format!(
                "Unknown employee \"{}\"",
                task.assigned_to
            )));
        }
        if let Some(dep) = task.dependency.as_deref() {
            if dep == task.name {
                return Err(WizardError::validation(format!(
                    "Task \"{}\" cannot depend on itself",
                    task.name
                )));
            }
            if !self.task_exists(dep) {
                return Err(WizardError::validation(format!(
                    "Unknown dependency \"{dep}\""
                )));
            }
        }
        debug!(name = %task.name, assigned_to = %task.assigned_to, "task added");
        self.tasks.push(task);
        Ok(())
    }

    pub fn remove_task(&mut self, index: usize) -> Result<Task, WizardError> {
        if index >= self.tasks.len() {
            return Err(out_of_range("task", index, self.tasks.len()));
        }
        Ok(self.tasks.remove(index))
    }

    /// Wholesale replacement, used by bulk import. Duplicate names are
    /// rejected and leave the store untouched.
    pub fn replace_all(
        &mut self,
        project: ProjectConfig,
        employees: Vec<Employee>,
        tasks: Vec<Task>,
    ) -> Result<(), WizardError> {
        if let Some(name) = first_duplicate(employees.iter().map(|emp| emp.name.as_str())) {
            return Err(WizardError::validation(format!(
                "Imported employees contain \"{name}\" more than once"
            )));
        }
        if let Some(name) = first_duplicate(tasks.iter().map(|task| task.name.as_str())) {
            return Err(WizardError::validation(format!(
                "Imported tasks contain \"{name}\" more than once"
            )));
        }

        self.project = Some(project);
        self.employees = employees;
        self.tasks = tasks;
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn out_of_range(kind: &str, index: usize, len: usize) -> WizardError {
    WizardError::validation(format!(
        "No {kind} at position {} (list has {len})",
        index.saturating_add(1)
    ))
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    names.into_iter().find(|name| !seen.insert(*name))
}
