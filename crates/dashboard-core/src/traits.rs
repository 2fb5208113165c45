use async_trait::async_trait;
use crate::{TaskEnvelope, TaskError, TaskId, TaskRequest};

/// Submit + poll contract of the analytics job server.
///
/// Implemented by the HTTP client and by in-memory fakes in tests.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Enqueue a job and return the identifier the queue assigned to it.
    async fn submit(&self, request: &TaskRequest) -> Result<TaskId, TaskError>;

    /// Fetch the current status envelope of a job.
    async fn status(&self, task_id: &TaskId) -> Result<TaskEnvelope, TaskError>;

    fn backend_name(&self) -> &'static str;
}
