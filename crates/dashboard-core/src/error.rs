use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    /// Network or HTTP failure. Never retried by the poller.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend reported the task as failed.
    #[error("Backend task failed: {0}")]
    Backend(String),

    #[error("Task timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Unexpected data shape: {0}")]
    DataShape(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A newer cycle replaced the one this result belonged to.
    #[error("Superseded by a newer request")]
    Superseded,
}

impl TaskError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, TaskError::Superseded)
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
