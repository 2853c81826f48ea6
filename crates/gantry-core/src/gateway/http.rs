use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use gantry_shared::{
    ApiReply, Employee, EmployeesPayload, ExportRequest, ImportedProject, ProjectConfig, Schedule,
    Task, TasksPayload,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::{Gateway, GatewayError};
use crate::config::Config;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// [`Gateway`] over the scheduling service's HTTP/JSON API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client for scheduling service")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(cfg))]
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = cfg
            .get("gateway.url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = match cfg.get("gateway.timeout") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid gateway.timeout: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        debug!(%base_url, timeout_secs, "configured scheduling service");
        Self::new(&base_url, Duration::from_secs(timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B>(&self, path: &str, body: &B) -> Result<Response, GatewayError>
    where
        B: serde::Serialize + ?Sized + Sync,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        ensure_success(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<Response, GatewayError> {
        let response = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(network_error)?;
        ensure_success(response).await
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    #[instrument(skip(self, project), fields(name = %project.name))]
    async fn create_project(&self, project: &ProjectConfig) -> Result<(), GatewayError> {
        self.post_json("/api/project", project).await?;
        Ok(())
    }

    #[instrument(skip(self, employees), fields(count = employees.len()))]
    async fn replace_employees(&self, employees: &[Employee]) -> Result<(), GatewayError> {
        self.post_json("/api/employees", &EmployeesPayload { employees })
            .await?;
        Ok(())
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    async fn replace_tasks(&self, tasks: &[Task]) -> Result<(), GatewayError> {
        self.post_json("/api/tasks", &TasksPayload { tasks }).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn compute_schedule(&self) -> Result<(), GatewayError> {
        self.post_empty("/api/calculate").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_schedule(&self) -> Result<Schedule, GatewayError> {
        let response = self
            .client
            .get(self.url("/api/gantt"))
            .send()
            .await
            .map_err(network_error)?;
        let response = ensure_success(response).await?;
        decode_json(response).await
    }

    #[instrument(skip(self))]
    async fn reset_project(&self) -> Result<(), GatewayError> {
        self.post_empty("/api/reset").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn export_schedule(&self, filename: &str) -> Result<Vec<u8>, GatewayError> {
        let request = ExportRequest {
            filename: filename.to_string(),
        };
        let response = self.post_json("/api/export", &request).await?;
        let bytes = response.bytes().await.map_err(network_error)?;
        debug!(size = bytes.len(), "received exported workbook");
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, contents), fields(size = contents.len()))]
    async fn import_project(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<ImportedProject, GatewayError> {
        let part = Part::bytes(contents).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(self.url("/api/import"))
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;
        let response = ensure_success(response).await?;
        decode_json(response).await
    }
}

fn network_error(err: reqwest::Error) -> GatewayError {
    warn!(error = %err, "scheduling service unreachable");
    GatewayError::Network(err.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    warn!(%status, message = ?message, "scheduling service rejected request");
    Err(GatewayError::Rejected { message })
}

fn error_message(status: StatusCode, body: &str) -> Option<String> {
    match serde_json::from_str::<ApiReply>(body) {
        Ok(reply) => reply.error,
        Err(err) => {
            debug!(%status, error = %err, "error body was not JSON");
            None
        }
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let body = response.text().await.map_err(network_error)?;
    serde_json::from_str(&body).map_err(|err| {
        GatewayError::rejected(format!("malformed response from scheduling service: {err}"))
    })
}
