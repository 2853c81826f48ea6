//! Boundary to the remote scheduling service.
//!
//! The wizard never computes schedules itself. It pushes the project, the
//! employee roster and the task list through a [`Gateway`], asks the
//! service to compute, and fetches the result. Every call is awaited
//! before the next one is issued.

pub mod http;

use async_trait::async_trait;
use gantry_shared::{Employee, ImportedProject, ProjectConfig, Schedule, Task};
use thiserror::Error;

pub use self::http::HttpGateway;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The service answered with an error status.
    #[error(
        "rejected by scheduling service: {}",
        .message.as_deref().unwrap_or("no message")
    )]
    Rejected { message: Option<String> },

    /// No usable answer arrived at all.
    #[error("{0}")]
    Network(String),
}

impl GatewayError {
    pub fn rejected(message: impl Into<String>) -> Self {
        GatewayError::Rejected {
            message: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_project(&self, project: &ProjectConfig) -> Result<(), GatewayError>;

    /// Replaces the whole employee roster on the service.
    async fn replace_employees(&self, employees: &[Employee]) -> Result<(), GatewayError>;

    /// Replaces the whole task list on the service.
    async fn replace_tasks(&self, tasks: &[Task]) -> Result<(), GatewayError>;

    /// Computes a schedule from whatever was last submitted.
    async fn compute_schedule(&self) -> Result<(), GatewayError>;

    async fn fetch_schedule(&self) -> Result<Schedule, GatewayError>;

    async fn reset_project(&self) -> Result<(), GatewayError>;

    async fn export_schedule(&self, filename: &str) -> Result<Vec<u8>, GatewayError>;

    async fn import_project(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<ImportedProject, GatewayError>;
}
