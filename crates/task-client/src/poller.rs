use dashboard_core::{CycleToken, TaskBackend, TaskError, TaskId, TaskStatus};
use serde_json::Value;
use std::sync::Arc;

use crate::config::PollSettings;

/// Polls the task-status endpoint until a job settles.
///
/// `processing` is retried up to the attempt budget; a transport error ends
/// the poll immediately.
#[derive(Clone)]
pub struct TaskPoller {
    backend: Arc<dyn TaskBackend>,
    settings: PollSettings,
}

impl TaskPoller {
    pub fn new(backend: Arc<dyn TaskBackend>, settings: PollSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Poll a task nobody can supersede.
    pub async fn poll_task(&self, task_id: &TaskId) -> Result<Value, TaskError> {
        self.poll(task_id, &CycleToken::detached()).await
    }

    /// Poll on behalf of a fetch cycle. Once `token` goes stale no further
    /// attempts are scheduled and `TaskError::Superseded` is returned.
    pub async fn poll(&self, task_id: &TaskId, token: &CycleToken) -> Result<Value, TaskError> {
        let max_attempts = self.settings.max_attempts;

        for attempt in 1..=max_attempts {
            if !token.is_current() {
                tracing::debug!("Task {} superseded before attempt {}", task_id, attempt);
                return Err(TaskError::Superseded);
            }

            let envelope = self.backend.status(task_id).await?;
            match envelope.into_status() {
                TaskStatus::Completed(data) => {
                    tracing::debug!("Task {} completed after {} attempt(s)", task_id, attempt);
                    return Ok(data);
                }
                TaskStatus::Failed(message) => {
                    tracing::warn!("Task {} failed: {}", task_id, message);
                    return Err(TaskError::Backend(message));
                }
                TaskStatus::Processing => {
                    tracing::debug!("Task {} still processing ({}/{})", task_id, attempt, max_attempts);
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.settings.interval).await;
            }
        }

        tracing::warn!("Task {} timed out after {} attempts", task_id, max_attempts);
        Err(TaskError::Timeout {
            attempts: max_attempts,
        })
    }
}
