//! Scripted in-memory [`TaskBackend`] for tests.
//!
//! Task ids are handed out as `t1`, `t2`, ... in submission order. Each id
//! replays its scripted status responses in order and reports `processing`
//! once the script runs out. A gated id holds every status call until
//! [`ScriptedBackend::release`] is called for it.

use async_trait::async_trait;
use dashboard_core::{TaskBackend, TaskEnvelope, TaskError, TaskId, TaskRequest};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::watch;

type Script = VecDeque<Result<TaskEnvelope, TaskError>>;

#[derive(Default)]
struct Inner {
    next_id: u32,
    submissions: Vec<TaskRequest>,
    submit_errors: VecDeque<TaskError>,
    scripts: HashMap<String, Script>,
    gates: HashMap<String, watch::Sender<bool>>,
    status_calls: HashMap<String, u32>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    inner: Mutex<Inner>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue status responses for a task id.
    pub fn script(&self, task_id: &str, responses: Vec<Result<TaskEnvelope, TaskError>>) {
        self.lock()
            .scripts
            .entry(task_id.to_string())
            .or_default()
            .extend(responses);
    }

    /// Make the next submission fail with `error`.
    pub fn fail_next_submit(&self, error: TaskError) {
        self.lock().submit_errors.push_back(error);
    }

    /// Hold status calls for `task_id` until released.
    pub fn gate(&self, task_id: &str) {
        let (tx, _rx) = watch::channel(false);
        self.lock().gates.insert(task_id.to_string(), tx);
    }

    pub fn release(&self, task_id: &str) {
        if let Some(tx) = self.lock().gates.get(task_id) {
            tx.send_replace(true);
        }
    }

    pub fn submissions(&self) -> Vec<TaskRequest> {
        self.lock().submissions.clone()
    }

    pub fn status_calls(&self, task_id: &str) -> u32 {
        self.lock().status_calls.get(task_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl TaskBackend for ScriptedBackend {
    async fn submit(&self, request: &TaskRequest) -> Result<TaskId, TaskError> {
        let mut inner = self.lock();
        if let Some(err) = inner.submit_errors.pop_front() {
            return Err(err);
        }
        inner.next_id += 1;
        inner.submissions.push(request.clone());
        Ok(TaskId(format!("t{}", inner.next_id)))
    }

    async fn status(&self, task_id: &TaskId) -> Result<TaskEnvelope, TaskError> {
        let gate = {
            let mut inner = self.lock();
            *inner.status_calls.entry(task_id.0.clone()).or_default() += 1;
            inner.gates.get(&task_id.0).map(|tx| tx.subscribe())
        };

        if let Some(mut rx) = gate {
            // Sender lives as long as the backend
            let _ = rx.wait_for(|open| *open).await;
        }

        self.lock()
            .scripts
            .get_mut(&task_id.0)
            .and_then(|s| s.pop_front())
            .unwrap_or_else(|| Ok(TaskEnvelope::processing()))
    }

    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}
