use async_trait::async_trait;
use dashboard_core::{
    CycleToken, FilterSelection, GenerationCounter, TaskError, TaskHandle, TaskId,
};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};
use task_client::TaskClient;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::state::{Phase, WidgetState};
use crate::store::FilterStore;

/// One dashboard widget: which filters it depends on, which backend task it
/// submits, and how the task result becomes renderable data.
#[async_trait]
pub trait Widget: Send + Sync + 'static {
    /// The subset of the filters that governs this widget
    type Params: Clone + PartialEq + Debug + Send + Sync + 'static;
    type Data: Clone + Default + Debug + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// `None` when the filters are incomplete and the widget should stay idle.
    fn params(&self, filters: &FilterSelection) -> Option<Self::Params>;

    async fn submit(&self, client: &TaskClient, params: &Self::Params) -> Result<TaskId, TaskError>;

    fn decode(&self, params: &Self::Params, payload: Value) -> Result<Self::Data, TaskError>;
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Settled,
    Errored(TaskError),
    /// A newer cycle started; nothing was written.
    Stale,
}

struct CycleState<P> {
    in_flight: Option<(u64, P)>,
    last_requested: Option<P>,
}

/// Runs submit + poll cycles for one widget and publishes its state.
///
/// Every cycle is tagged with a generation. Commits happen under the cycle
/// lock and only for the current generation, so the state always reflects
/// the most recently requested parameters.
pub struct FetchOrchestrator<W: Widget> {
    widget: W,
    client: TaskClient,
    generations: GenerationCounter,
    cycle: Mutex<CycleState<W::Params>>,
    state: watch::Sender<WidgetState<W::Data>>,
}

impl<W: Widget> FetchOrchestrator<W> {
    pub fn new(widget: W, client: TaskClient) -> Self {
        let (state, _rx) = watch::channel(WidgetState::default());
        Self {
            widget,
            client,
            generations: GenerationCounter::new(),
            cycle: Mutex::new(CycleState {
                in_flight: None,
                last_requested: None,
            }),
            state,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn state(&self) -> WidgetState<W::Data> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetState<W::Data>> {
        self.state.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, CycleState<W::Params>> {
        self.cycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a cycle for `filters`, unless the widget has nothing to fetch or
    /// an identical request is already in flight.
    pub fn begin(&self, filters: &FilterSelection) -> Option<(CycleToken, W::Params)> {
        let params = self.widget.params(filters)?;
        self.begin_with(params, false)
    }

    fn begin_with(&self, params: W::Params, only_if_changed: bool) -> Option<(CycleToken, W::Params)> {
        let mut cycle = self.lock();

        if only_if_changed && cycle.last_requested.as_ref() == Some(&params) {
            return None;
        }
        if let Some((generation, in_flight)) = &cycle.in_flight {
            if *generation == self.generations.current() && *in_flight == params {
                tracing::debug!("{}: identical request already in flight", self.widget.name());
                return None;
            }
        }

        let token = self.generations.advance();
        cycle.in_flight = Some((token.generation(), params.clone()));
        cycle.last_requested = Some(params.clone());

        self.state.send_modify(|s| {
            s.phase = Phase::Submitting;
            s.loading = true;
            s.error = None;
            s.generation = token.generation();
        });

        Some((token, params))
    }

    /// Drive one cycle to completion and commit its result if still current.
    pub async fn run_cycle(&self, token: CycleToken, params: W::Params) -> CycleOutcome {
        let result = self.execute(&token, &params).await;
        self.commit(&token, result)
    }

    async fn execute(&self, token: &CycleToken, params: &W::Params) -> Result<W::Data, TaskError> {
        let task_id = self.widget.submit(&self.client, params).await?;
        let handle = TaskHandle {
            task_id,
            submitted: params.clone(),
        };
        self.mark_polling(token, &handle);

        let payload = self.client.wait(&handle.task_id, token).await?;
        self.widget.decode(&handle.submitted, payload)
    }

    fn mark_polling(&self, token: &CycleToken, handle: &TaskHandle<W::Params>) {
        let _cycle = self.lock();
        if !token.is_current() {
            return;
        }
        tracing::debug!("{}: polling task {}", self.widget.name(), handle.task_id);
        self.state.send_if_modified(|s| {
            if s.generation == token.generation() && s.phase == Phase::Submitting {
                s.phase = Phase::Polling;
                true
            } else {
                false
            }
        });
    }

    fn commit(&self, token: &CycleToken, result: Result<W::Data, TaskError>) -> CycleOutcome {
        let mut cycle = self.lock();

        if !token.is_current() {
            tracing::debug!(
                "{}: dropping result of superseded cycle {}",
                self.widget.name(),
                token.generation()
            );
            return CycleOutcome::Stale;
        }
        if matches!(result, Err(TaskError::Superseded)) {
            return CycleOutcome::Stale;
        }
        cycle.in_flight = None;

        match result {
            Ok(data) => {
                tracing::info!("{}: settled (cycle {})", self.widget.name(), token.generation());
                self.state.send_modify(|s| {
                    s.phase = Phase::Settled;
                    s.data = data;
                    s.loading = false;
                    s.error = None;
                    s.generation = token.generation();
                });
                CycleOutcome::Settled
            }
            Err(err) => {
                tracing::warn!("{}: {}", self.widget.name(), err);
                self.state.send_modify(|s| {
                    s.phase = Phase::Errored;
                    s.data = W::Data::default();
                    s.loading = false;
                    s.error = Some(err.clone());
                    s.generation = token.generation();
                });
                CycleOutcome::Errored(err)
            }
        }
    }

    /// Start a cycle for `filters` in the background.
    pub fn trigger(self: &Arc<Self>, filters: &FilterSelection) -> Option<JoinHandle<CycleOutcome>> {
        let (token, params) = self.begin(filters)?;
        Some(self.spawn_cycle(token, params))
    }

    fn trigger_if_changed(self: &Arc<Self>, filters: &FilterSelection) -> Option<JoinHandle<CycleOutcome>> {
        let Some(params) = self.widget.params(filters) else {
            self.reset_idle();
            return None;
        };
        let (token, params) = self.begin_with(params, true)?;
        Some(self.spawn_cycle(token, params))
    }

    /// The filters no longer describe anything to fetch: retire the running
    /// cycle and drop whatever the widget was showing.
    fn reset_idle(&self) {
        let mut cycle = self.lock();
        if cycle.in_flight.is_none() && cycle.last_requested.is_none() {
            return;
        }

        let token = self.generations.advance();
        cycle.in_flight = None;
        cycle.last_requested = None;
        tracing::debug!("{}: filters incomplete, back to idle", self.widget.name());

        self.state.send_modify(|s| {
            *s = WidgetState {
                generation: token.generation(),
                ..WidgetState::default()
            };
        });
    }

    fn spawn_cycle(self: &Arc<Self>, token: CycleToken, params: W::Params) -> JoinHandle<CycleOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_cycle(token, params).await })
    }

    /// Follow the filter store, starting a cycle whenever this widget's
    /// governing parameters change. Ends when every store handle is dropped.
    pub fn watch(self: &Arc<Self>, store: &FilterStore) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = store.subscribe();
        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            this.trigger_if_changed(&initial);

            while rx.changed().await.is_ok() {
                let filters = rx.borrow_and_update().clone();
                this.trigger_if_changed(&filters);
            }
            tracing::debug!("{}: filter store closed", this.widget.name());
        })
    }

    /// Wait until the most recently started cycle has settled or errored, or
    /// the widget was reset to idle. A state left behind by an older cycle
    /// never satisfies the wait.
    pub async fn wait_settled(&self) -> WidgetState<W::Data> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|s| {
                let current = self.generations.current();
                current > 0 && s.generation == current && !s.loading
            })
            .await
            .map(|s| s.clone());
        match settled {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::ChartsWidget;
    use dashboard_core::{TaskEnvelope, Timeframe};
    use serde_json::json;
    use series_builder::SeriesMode;
    use std::time::Duration;
    use task_client::testing::ScriptedBackend;
    use task_client::PollSettings;

    fn orchestrator(backend: &Arc<ScriptedBackend>) -> Arc<FetchOrchestrator<ChartsWidget>> {
        let client = TaskClient::new(
            backend.clone(),
            PollSettings {
                interval: Duration::from_secs(1),
                max_attempts: 180,
            },
        );
        Arc::new(FetchOrchestrator::new(ChartsWidget, client))
    }

    fn filters(company: &str) -> FilterSelection {
        FilterSelection {
            company: company.to_string(),
            timeframe: Timeframe::Quarterly,
            variables: vec!["Close".to_string()],
            ..FilterSelection::default()
        }
    }

    fn closes(first: f64, second: f64) -> Value {
        json!([
            {"date": "2024-01-01", "Close": first},
            {"date": "2024-04-01", "Close": second},
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_settles_with_series() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script(
            "t1",
            vec![
                Ok(TaskEnvelope::processing()),
                Ok(TaskEnvelope::processing()),
                Ok(TaskEnvelope::completed(closes(150.0, 160.0))),
            ],
        );
        let orch = orchestrator(&backend);

        let outcome = orch.trigger(&filters("AAPL")).unwrap().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Settled);

        let state = orch.state();
        assert_eq!(state.phase, Phase::Settled);
        assert!(!state.loading);
        assert!(state.error.is_none());
        assert_eq!(state.data.mode, SeriesMode::Line);
        assert_eq!(state.data.series[0].name, "Close");
        assert_eq!(state.data.series[0].points[0].x, 1704067200000);
        assert_eq!(state.data.series[0].points[1].x, 1711929600000);
        assert_eq!(backend.status_calls("t1"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_request_wins() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.gate("t1");
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        backend.script("t2", vec![Ok(TaskEnvelope::completed(closes(150.0, 160.0)))]);
        let orch = orchestrator(&backend);

        let first = orch.trigger(&filters("AAPL")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = orch.trigger(&filters("MSFT")).unwrap();

        assert_eq!(second.await.unwrap(), CycleOutcome::Settled);
        backend.release("t1");
        assert_eq!(first.await.unwrap(), CycleOutcome::Stale);

        let state = orch.state();
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(state.generation, 2);
        let values: Vec<_> = state.data.series[0].points.iter().map(|p| p.y.clone()).collect();
        assert_eq!(
            values,
            vec![
                series_builder::PointValue::Scalar(150.0),
                series_builder::PointValue::Scalar(160.0)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_does_not_clear() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.gate("t1");
        backend.script("t1", vec![Ok(TaskEnvelope::failed("no data for company"))]);
        backend.script("t2", vec![Ok(TaskEnvelope::completed(closes(150.0, 160.0)))]);
        let orch = orchestrator(&backend);

        let first = orch.trigger(&filters("AAPL")).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = orch.trigger(&filters("MSFT")).unwrap();
        assert_eq!(second.await.unwrap(), CycleOutcome::Settled);

        backend.release("t1");
        assert_eq!(first.await.unwrap(), CycleOutcome::Stale);

        let state = orch.state();
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(state.generation, 2);
        assert!(state.error.is_none());
        assert_eq!(state.data.series[0].points.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_in_flight_request_is_ignored() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.gate("t1");
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        let orch = orchestrator(&backend);

        let first = orch.trigger(&filters("AAPL")).unwrap();
        assert!(orch.trigger(&filters("AAPL")).is_none());

        backend.release("t1");
        assert_eq!(first.await.unwrap(), CycleOutcome::Settled);
        assert_eq!(backend.submissions().len(), 1);

        // Once settled, the same parameters may be fetched again
        assert!(orch.trigger(&filters("AAPL")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_data() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        backend.script("t2", vec![Ok(TaskEnvelope::failed("no data for company"))]);
        let orch = orchestrator(&backend);

        orch.trigger(&filters("AAPL")).unwrap().await.unwrap();
        assert!(!orch.state().data.is_empty());

        let outcome = orch.trigger(&filters("MSFT")).unwrap().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Errored(TaskError::Backend("no data for company".to_string()))
        );

        let state = orch.state();
        assert_eq!(state.phase, Phase::Errored);
        assert!(state.data.is_empty());
        assert!(!state.loading);
        assert_eq!(state.error_message().as_deref(), Some("Backend task failed: no data for company"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_errors_widget() {
        let backend = Arc::new(ScriptedBackend::new());
        let orch = orchestrator(&backend);

        let outcome = orch.trigger(&filters("AAPL")).unwrap().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Errored(TaskError::Timeout { attempts: 180 }));
        assert_eq!(
            orch.state().error_message().as_deref(),
            Some("The analysis took too long. Please try again.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_array_payload_is_data_shape_error() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("t1", vec![Ok(TaskEnvelope::completed(json!({"oops": 1})))]);
        let orch = orchestrator(&backend);

        let outcome = orch.trigger(&filters("AAPL")).unwrap().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Errored(TaskError::DataShape(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_filters_stay_idle() {
        let backend = Arc::new(ScriptedBackend::new());
        let orch = orchestrator(&backend);

        assert!(orch.trigger(&filters("  ")).is_none());
        assert_eq!(orch.state().phase, Phase::Idle);
        assert!(backend.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_follows_store() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        backend.script("t2", vec![Ok(TaskEnvelope::completed(closes(150.0, 160.0)))]);
        let orch = orchestrator(&backend);
        let store = FilterStore::new(filters("AAPL"));

        let watcher = orch.watch(&store);
        let state = orch.wait_settled().await;
        assert_eq!(state.generation, 1);

        // Query edits do not govern the charts widget
        store.set_query("what changed?");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.submissions().len(), 1);

        store.set_company("MSFT");
        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = orch.wait_settled().await;
        assert_eq!(state.generation, 2);
        assert_eq!(backend.submissions().len(), 2);

        drop(store);
        tokio_test::assert_ok!(watcher.await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_company_retires_running_cycle() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.gate("t1");
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        backend.script("t2", vec![Ok(TaskEnvelope::completed(closes(150.0, 160.0)))]);
        let orch = orchestrator(&backend);
        let store = FilterStore::new(filters("AAPL"));

        let watcher = orch.watch(&store);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(orch.state().loading);

        store.set_company("");
        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = orch.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.loading);
        assert!(state.data.is_empty());
        assert_eq!(state.generation, 2);

        // The old task finishing must not bring its data back
        backend.release("t1");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(orch.state().phase, Phase::Idle);
        assert!(orch.state().data.is_empty());
        assert_eq!(backend.submissions().len(), 1);

        // Same company as before the reset is fetched again
        store.set_company("AAPL");
        let state = orch.wait_settled().await;
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(state.generation, 3);
        assert_eq!(backend.submissions().len(), 2);

        watcher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_settled_ignores_previous_cycle() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.script("t1", vec![Ok(TaskEnvelope::completed(closes(1.0, 2.0)))]);
        backend.gate("t2");
        backend.script("t2", vec![Ok(TaskEnvelope::completed(closes(150.0, 160.0)))]);
        let orch = orchestrator(&backend);

        orch.trigger(&filters("AAPL")).unwrap().await.unwrap();
        assert_eq!(orch.wait_settled().await.generation, 1);

        let second = orch.trigger(&filters("MSFT")).unwrap();
        let early = tokio::time::timeout(Duration::from_secs(5), orch.wait_settled()).await;
        assert!(early.is_err());

        backend.release("t2");
        let state = orch.wait_settled().await;
        assert_eq!(state.generation, 2);
        assert_eq!(state.phase, Phase::Settled);
        assert_eq!(second.await.unwrap(), CycleOutcome::Settled);
    }
}
