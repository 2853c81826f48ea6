use std::fmt;

use thiserror::Error;

use crate::gateway::GatewayError;

/// Remote operations the wizard issues, used to pick the fallback message
/// when the scheduling service rejects a call without saying why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateProject,
    ReplaceEmployees,
    ReplaceTasks,
    ComputeSchedule,
    FetchSchedule,
    ResetProject,
    ExportSchedule,
    ImportProject,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateProject => "create_project",
            Operation::ReplaceEmployees => "replace_employees",
            Operation::ReplaceTasks => "replace_tasks",
            Operation::ComputeSchedule => "compute_schedule",
            Operation::FetchSchedule => "fetch_schedule",
            Operation::ResetProject => "reset_project",
            Operation::ExportSchedule => "export_schedule",
            Operation::ImportProject => "import_project",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Operation::CreateProject => "Error creating project",
            Operation::ReplaceEmployees => "Error adding employees",
            Operation::ReplaceTasks => "Error adding tasks",
            Operation::ComputeSchedule => "Error calculating schedule",
            Operation::FetchSchedule => "Error loading Gantt chart",
            Operation::ResetProject => "Error resetting project",
            Operation::ExportSchedule => "Error exporting to Excel",
            Operation::ImportProject => "Error importing project",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    /// Rejected locally; nothing was sent.
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Remote { operation: Operation, message: String },

    #[error("Network error: {message}")]
    Network { operation: Operation, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl WizardError {
    pub fn validation(message: impl Into<String>) -> Self {
        WizardError::Validation(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        WizardError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn from_gateway(operation: Operation, err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { message } => WizardError::Remote {
                operation,
                message: message
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| operation.default_message().to_string()),
            },
            GatewayError::Network(message) => WizardError::Network { operation, message },
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, WizardError::Validation(_))
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            WizardError::Remote { operation, .. } | WizardError::Network { operation, .. } => {
                Some(*operation)
            }
            _ => None,
        }
    }
}
