use series_builder::QualitativeAnswer;
use std::sync::Arc;
use task_client::TaskClient;
use tokio::sync::watch;

use crate::orchestrator::{CycleOutcome, FetchOrchestrator};
use crate::state::{Phase, WidgetState};
use crate::store::FilterStore;
use crate::widgets::QualitativeWidget;

/// The Q&A panel. Questions are asked explicitly; the draft query lives in
/// the shared [`FilterStore`] so it survives failed attempts.
#[derive(Clone)]
pub struct QualitativeAssistant {
    orchestrator: Arc<FetchOrchestrator<QualitativeWidget>>,
    store: FilterStore,
}

impl QualitativeAssistant {
    pub fn new(client: TaskClient, store: FilterStore) -> Self {
        Self {
            orchestrator: Arc::new(FetchOrchestrator::new(QualitativeWidget, client)),
            store,
        }
    }

    pub fn query(&self) -> String {
        self.store.snapshot().query
    }

    pub fn set_query(&self, query: impl Into<String>) -> bool {
        self.store.set_query(query)
    }

    pub fn is_analyzing(&self) -> bool {
        self.orchestrator.state().loading
    }

    pub fn state(&self) -> WidgetState<Option<QualitativeAnswer>> {
        self.orchestrator.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetState<Option<QualitativeAnswer>>> {
        self.orchestrator.subscribe()
    }

    pub fn answer(&self) -> Option<QualitativeAnswer> {
        let state = self.orchestrator.state();
        match state.phase {
            Phase::Settled => state.data,
            _ => None,
        }
    }

    /// Submit the current draft and wait for the answer.
    ///
    /// Returns `None` without submitting when the draft is blank or the
    /// same question is already being analyzed. On success the draft is
    /// cleared unless it was edited while the question was in flight.
    pub async fn ask(&self) -> Option<CycleOutcome> {
        let filters = self.store.snapshot();
        let Some((token, params)) = self.orchestrator.begin(&filters) else {
            tracing::debug!("qualitative: nothing to ask");
            return None;
        };
        let submitted = params.query.clone();

        let outcome = self.orchestrator.run_cycle(token, params).await;
        if outcome == CycleOutcome::Settled {
            self.store.update(|f| {
                if f.query.trim() == submitted {
                    f.query.clear();
                }
            });
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::{FilterSelection, TaskEnvelope, TaskError};
    use serde_json::json;
    use std::time::Duration;
    use task_client::testing::ScriptedBackend;
    use task_client::PollSettings;

    fn assistant(backend: &Arc<ScriptedBackend>, query: &str) -> QualitativeAssistant {
        let client = TaskClient::new(
            backend.clone(),
            PollSettings {
                interval: Duration::from_secs(1),
                max_attempts: 180,
            },
        );
        let store = FilterStore::new(FilterSelection {
            company: "Apple Inc.".to_string(),
            analysis_period: "Q1_2024".to_string(),
            query: query.to_string(),
            ..FilterSelection::default()
        });
        QualitativeAssistant::new(client, store)
    }

    fn answer() -> serde_json::Value {
        json!({
            "final_response": "Revenue grew on services.",
            "audit_score": {"faithfulness": 0.92, "answer_relevancy": 0.88}
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_preserves_query() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script(
            "t1",
            vec![
                Ok(TaskEnvelope::processing()),
                Ok(TaskEnvelope::failed("filing not found")),
            ],
        );
        let assistant = assistant(&backend, "What drove revenue?");

        let outcome = assistant.ask().await.unwrap();

        assert_eq!(
            outcome,
            CycleOutcome::Errored(TaskError::Backend("filing not found".to_string()))
        );
        let state = assistant.state();
        assert_eq!(state.phase, Phase::Errored);
        assert_eq!(state.data, None);
        assert_eq!(assistant.query(), "What drove revenue?");
        assert!(!assistant.is_analyzing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_query() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("t1", vec![Ok(TaskEnvelope::completed(answer()))]);
        let assistant = assistant(&backend, "  What drove revenue? ");

        assert_eq!(assistant.ask().await, Some(CycleOutcome::Settled));

        assert_eq!(assistant.query(), "");
        assert!(!assistant.is_analyzing());
        let answer = assistant.answer().unwrap();
        assert_eq!(answer.final_response, "Revenue grew on services.");
        assert_eq!(answer.faithfulness_pct().round(), 92.0);
        assert_eq!(
            backend.submissions()[0],
            dashboard_core::TaskRequest::Qualitative {
                company: "Apple Inc.".to_string(),
                period: "Q1_2024".to_string(),
                query: "What drove revenue?".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_edited_query_survives_success() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.gate("t1");
        backend.script("t1", vec![Ok(TaskEnvelope::completed(answer()))]);
        let assistant = assistant(&backend, "What drove revenue?");

        let pending = {
            let assistant = assistant.clone();
            tokio::spawn(async move { assistant.ask().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(assistant.is_analyzing());

        assistant.set_query("And margins?");
        backend.release("t1");

        assert_eq!(pending.await.unwrap(), Some(CycleOutcome::Settled));
        assert_eq!(assistant.query(), "And margins?");
        assert!(!assistant.is_analyzing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_query_is_not_submitted() {
        let backend = Arc::new(ScriptedBackend::new());
        let assistant = assistant(&backend, "   ");

        assert_eq!(assistant.ask().await, None);
        assert!(backend.submissions().is_empty());
        assert_eq!(assistant.state().phase, Phase::Idle);
    }
}
