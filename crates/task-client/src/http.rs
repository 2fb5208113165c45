use async_trait::async_trait;
use dashboard_core::{TaskBackend, TaskEnvelope, TaskError, TaskId, TaskRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Serialize)]
struct QualitativeBody<'a> {
    company: &'a str,
    period: &'a str,
    query: &'a str,
}

/// reqwest-backed client for the analytics job server.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TaskError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Status endpoint for `task_id`, with the id escaped as a single path
    /// segment.
    fn status_url(&self, task_id: &TaskId) -> Result<reqwest::Url, TaskError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| TaskError::Transport(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| TaskError::Transport(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "task-status", task_id.0.as_str()]);
        Ok(url)
    }

    fn build(&self, request: &TaskRequest) -> reqwest::RequestBuilder {
        match request {
            TaskRequest::Charts {
                company,
                timeframe,
                variables,
            } => {
                let mut params = vec![("company", company.clone()), ("timeframe", timeframe.to_string())];
                params.extend(variables.iter().map(|v| ("variables", v.clone())));
                self.client.get(self.url("/api/charts")).query(&params)
            }
            TaskRequest::Ratios {
                company,
                timeframe,
                variables,
            } => {
                let mut params = vec![("company", company.clone()), ("timeframe", timeframe.to_string())];
                params.extend(variables.iter().map(|v| ("variables", v.clone())));
                self.client.get(self.url("/api/ratios")).query(&params)
            }
            TaskRequest::RiskMatrix {
                company,
                period,
                timeframe,
                top_n,
            } => self.client.get(self.url("/api/risk_matrix")).query(&[
                ("company", company.clone()),
                ("period", period.clone()),
                ("timeframe", timeframe.to_string()),
                ("top_n", top_n.to_string()),
            ]),
            TaskRequest::Performance {
                company,
                period,
                timeframe,
            } => self.client.get(self.url("/api/performance")).query(&[
                ("company", company.clone()),
                ("period", period.clone()),
                ("timeframe", timeframe.to_string()),
            ]),
            TaskRequest::Qualitative {
                company,
                period,
                query,
            } => self.client.post(self.url("/api/qualitative")).json(&QualitativeBody {
                company,
                period,
                query,
            }),
        }
    }

    /// Send and fail on any non-2xx status. No retries at this layer.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, TaskError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TaskError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(TaskError::Transport(format!(
                "HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn submit(&self, request: &TaskRequest) -> Result<TaskId, TaskError> {
        let response = self.send(self.build(request)).await?;
        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TaskError::Transport(format!("invalid submit response: {}", e)))?;
        Ok(TaskId(body.task_id))
    }

    async fn status(&self, task_id: &TaskId) -> Result<TaskEnvelope, TaskError> {
        let url = self.status_url(task_id)?;
        let response = self.send(self.client.get(url)).await?;
        response
            .json::<TaskEnvelope>()
            .await
            .map_err(|e| TaskError::Transport(format!("invalid task status response: {}", e)))
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
