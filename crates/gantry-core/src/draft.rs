//! Authoring forms.
//!
//! A draft holds exactly what a form yields: raw strings and signed
//! integers. `validate` turns it into a typed entity or a validation error;
//! `from_*` fills the form back in when an entity is pulled out for editing.

use chrono::NaiveDate;
use gantry_shared::{Employee, ProjectConfig, Task, WorkPattern};
use serde::{Deserialize, Serialize};

use crate::datetime::{format_date_list, parse_date, parse_date_list, today};
use crate::error::WizardError;

const REQUIRED_FIELDS: &str = "Please fill in all required fields";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub name: String,
    pub start_date: String,
    /// Comma-separated dates and ranges.
    pub global_holidays: String,
}

impl ProjectDraft {
    /// Blank form with today's date as the start date.
    pub fn with_defaults() -> Self {
        Self {
            start_date: format_date(today()),
            ..Self::default()
        }
    }

    pub fn from_config(project: &ProjectConfig) -> Self {
        Self {
            name: project.name.clone(),
            start_date: format_date(project.start_date),
            global_holidays: format_date_list(&project.global_holidays),
        }
    }

    pub fn validate(&self) -> Result<ProjectConfig, WizardError> {
        let name = self.name.trim();
        let start_date = self.start_date.trim();
        if name.is_empty() || start_date.is_empty() {
            return Err(WizardError::validation(REQUIRED_FIELDS));
        }

        let start_date = parse_date(start_date)
            .map_err(|err| WizardError::validation(format!("Invalid start date: {err}")))?;
        let global_holidays = parse_date_list(&self.global_holidays)
            .map_err(|err| WizardError::validation(format!("Invalid global holidays: {err:#}")))?;

        Ok(ProjectConfig {
            name: name.to_string(),
            start_date,
            global_holidays,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub work_pattern: WorkPattern,
    /// Comma-separated dates and ranges.
    pub holidays: String,
}

impl Default for EmployeeDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            work_pattern: WorkPattern::weekdays(),
            holidays: String::new(),
        }
    }
}

impl EmployeeDraft {
    pub fn from_employee(employee: &Employee) -> Self {
        Self {
            name: employee.name.clone(),
            work_pattern: employee.work_pattern,
            holidays: format_date_list(&employee.holidays),
        }
    }

    pub fn validate(&self) -> Result<Employee, WizardError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(WizardError::validation("Please enter employee name"));
        }
        if self.work_pattern.is_empty() {
            return Err(WizardError::validation(
                "Please select at least one working day",
            ));
        }
        let holidays = parse_date_list(&self.holidays).map_err(|err| {
            WizardError::validation(format!("Invalid holidays for {name}: {err:#}"))
        })?;

        Ok(Employee {
            name: name.to_string(),
            work_pattern: self.work_pattern,
            holidays,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub assigned_to: String,
    pub estimated_duration: i64,
    pub availability: i64,
    pub contingency_margin: i64,
    /// Empty means no dependency.
    pub dependency: String,
    /// Empty means the service picks the start.
    pub custom_start_date: String,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            assigned_to: String::new(),
            estimated_duration: 1,
            availability: 100,
            contingency_margin: 0,
            dependency: String::new(),
            custom_start_date: String::new(),
        }
    }
}

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            assigned_to: task.assigned_to.clone(),
            estimated_duration: i64::from(task.estimated_duration),
            availability: i64::from(task.availability),
            contingency_margin: i64::from(task.contingency_margin),
            dependency: task.dependency.clone().unwrap_or_default(),
            custom_start_date: task.custom_start_date.map(format_date).unwrap_or_default(),
        }
    }

    /// Field-level checks only. Whether the assignee and the dependency
    /// exist is decided against the entity store.
    pub fn validate(&self) -> Result<Task, WizardError> {
        let name = self.name.trim();
        let assigned_to = self.assigned_to.trim();
        if name.is_empty() || assigned_to.is_empty() || self.estimated_duration == 0 {
            return Err(WizardError::validation(REQUIRED_FIELDS));
        }

        if self.estimated_duration < 0 {
            return Err(WizardError::validation(
                "Estimated duration must be a positive number of days",
            ));
        }
        let estimated_duration = u32::try_from(self.estimated_duration)
            .map_err(|_| WizardError::validation("Estimated duration is too large"))?;

        if !(1..=100).contains(&self.availability) {
            return Err(WizardError::validation(
                "Availability must be between 1 and 100",
            ));
        }
        let availability = u8::try_from(self.availability)
            .map_err(|_| WizardError::validation("Availability must be between 1 and 100"))?;

        if self.contingency_margin < 0 {
            return Err(WizardError::validation(
                "Contingency margin cannot be negative",
            ));
        }
        let contingency_margin = u32::try_from(self.contingency_margin)
            .map_err(|_| WizardError::validation("Contingency margin is too large"))?;

        let dependency = Some(self.dependency.trim())
            .filter(|dep| !dep.is_empty())
            .map(str::to_string);

        let custom_start_date = match self.custom_start_date.trim() {
            "" => None,
            raw => Some(parse_date(raw).map_err(|err| {
                WizardError::validation(format!("Invalid custom start date: {err}"))
            })?),
        };

        Ok(Task {
            name: name.to_string(),
            assigned_to: assigned_to.to_string(),
            estimated_duration,
            availability,
            contingency_margin,
            dependency,
            custom_start_date,
        })
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
