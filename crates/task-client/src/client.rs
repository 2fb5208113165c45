use dashboard_core::{
    normalize_variables, CycleToken, TaskBackend, TaskError, TaskId, TaskRequest, Timeframe,
};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{DashboardConfig, PollSettings};
use crate::http::HttpBackend;
use crate::poller::TaskPoller;

fn required(field: &str, value: &str) -> Result<String, TaskError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TaskError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn required_variables(variables: &[String]) -> Result<Vec<String>, TaskError> {
    let variables = normalize_variables(variables);
    if variables.is_empty() {
        return Err(TaskError::InvalidRequest("at least one variable is required".to_string()));
    }
    Ok(variables)
}

/// Typed submission operations for every backend capability.
///
/// Each `submit_*` validates its inputs before any I/O and returns the
/// backend's task id. Nothing here retries; waiting is the poller's job.
#[derive(Clone)]
pub struct TaskClient {
    backend: Arc<dyn TaskBackend>,
    poller: TaskPoller,
}

impl TaskClient {
    pub fn new(backend: Arc<dyn TaskBackend>, poll: PollSettings) -> Self {
        Self {
            poller: TaskPoller::new(backend.clone(), poll),
            backend,
        }
    }

    /// HTTP client built from configuration
    pub fn from_config(config: &DashboardConfig) -> Result<Self, TaskError> {
        let backend = HttpBackend::new(config.api_url.clone(), config.http_timeout)?;
        Ok(Self::new(Arc::new(backend), config.poll))
    }

    pub fn poller(&self) -> &TaskPoller {
        &self.poller
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub async fn submit_charts_task(
        &self,
        company: &str,
        timeframe: Timeframe,
        variables: &[String],
    ) -> Result<TaskId, TaskError> {
        let request = TaskRequest::Charts {
            company: required("company", company)?,
            timeframe,
            variables: required_variables(variables)?,
        };
        self.submit(&request).await
    }

    pub async fn submit_ratios_task(
        &self,
        company: &str,
        timeframe: Timeframe,
        variables: &[String],
    ) -> Result<TaskId, TaskError> {
        let request = TaskRequest::Ratios {
            company: required("company", company)?,
            timeframe,
            variables: required_variables(variables)?,
        };
        self.submit(&request).await
    }

    pub async fn submit_risk_matrix_task(
        &self,
        company: &str,
        period: &str,
        timeframe: Timeframe,
        top_n: u32,
    ) -> Result<TaskId, TaskError> {
        if top_n == 0 {
            return Err(TaskError::InvalidRequest("top_n must be greater than zero".to_string()));
        }
        let request = TaskRequest::RiskMatrix {
            company: required("company", company)?,
            period: required("period", period)?,
            timeframe,
            top_n,
        };
        self.submit(&request).await
    }

    pub async fn submit_performance_task(
        &self,
        company: &str,
        period: &str,
        timeframe: Timeframe,
    ) -> Result<TaskId, TaskError> {
        let request = TaskRequest::Performance {
            company: required("company", company)?,
            period: required("period", period)?,
            timeframe,
        };
        self.submit(&request).await
    }

    pub async fn submit_qualitative_task(
        &self,
        company: &str,
        period: &str,
        query: &str,
    ) -> Result<TaskId, TaskError> {
        let request = TaskRequest::Qualitative {
            company: required("company", company)?,
            period: required("period", period)?,
            query: required("query", query)?,
        };
        self.submit(&request).await
    }

    async fn submit(&self, request: &TaskRequest) -> Result<TaskId, TaskError> {
        let task_id = self.backend.submit(request).await?;
        tracing::info!(
            "Submitted {} task {} for {}",
            request.kind(),
            task_id,
            request.company()
        );
        Ok(task_id)
    }

    /// Wait for a submitted task on behalf of a fetch cycle.
    pub async fn wait(&self, task_id: &TaskId, token: &CycleToken) -> Result<Value, TaskError> {
        self.poller.poll(task_id, token).await
    }

    /// Submit and wait, for callers that never need to cancel.
    pub async fn run(&self, request: TaskRequest) -> Result<Value, TaskError> {
        let task_id = match request {
            TaskRequest::Charts {
                company,
                timeframe,
                variables,
            } => self.submit_charts_task(&company, timeframe, &variables).await?,
            TaskRequest::Ratios {
                company,
                timeframe,
                variables,
            } => self.submit_ratios_task(&company, timeframe, &variables).await?,
            TaskRequest::RiskMatrix {
                company,
                period,
                timeframe,
                top_n,
            } => {
                self.submit_risk_matrix_task(&company, &period, timeframe, top_n)
                    .await?
            }
            TaskRequest::Performance {
                company,
                period,
                timeframe,
            } => {
                self.submit_performance_task(&company, &period, timeframe)
                    .await?
            }
            TaskRequest::Qualitative {
                company,
                period,
                query,
            } => self.submit_qualitative_task(&company, &period, &query).await?,
        };
        self.poller.poll_task(&task_id).await
    }
}
