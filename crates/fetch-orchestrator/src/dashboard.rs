use dashboard_core::TaskError;
use futures_util::future::{join_all, BoxFuture};
use std::sync::Arc;
use task_client::{DashboardConfig, TaskClient};
use tokio::task::JoinHandle;

use crate::assistant::QualitativeAssistant;
use crate::orchestrator::{FetchOrchestrator, Widget};
use crate::store::FilterStore;
use crate::widgets::{ChartsWidget, PerformanceWidget, RatiosWidget, RiskWidget};

/// One filter store wired to every widget.
///
/// Widgets share nothing but the store and the client, so a failure in one
/// never touches another's state.
pub struct Dashboard {
    store: FilterStore,
    pub charts: Arc<FetchOrchestrator<ChartsWidget>>,
    pub ratios: Arc<FetchOrchestrator<RatiosWidget>>,
    pub performance: Arc<FetchOrchestrator<PerformanceWidget>>,
    pub risk: Arc<FetchOrchestrator<RiskWidget>>,
    pub assistant: QualitativeAssistant,
}

impl Dashboard {
    pub fn new(client: TaskClient, store: FilterStore, risk_top_n: u32) -> Self {
        Self {
            charts: Arc::new(FetchOrchestrator::new(ChartsWidget, client.clone())),
            ratios: Arc::new(FetchOrchestrator::new(RatiosWidget, client.clone())),
            performance: Arc::new(FetchOrchestrator::new(PerformanceWidget, client.clone())),
            risk: Arc::new(FetchOrchestrator::new(RiskWidget { top_n: risk_top_n }, client.clone())),
            assistant: QualitativeAssistant::new(client, store.clone()),
            store,
        }
    }

    pub fn from_config(config: &DashboardConfig, store: FilterStore) -> Result<Self, TaskError> {
        let client = TaskClient::from_config(config)?;
        tracing::info!("Dashboard using {} backend at {}", client.backend_name(), config.api_url);
        Ok(Self::new(client, store, config.risk_top_n))
    }

    pub fn store(&self) -> &FilterStore {
        &self.store
    }

    /// Spawn one filter watcher per auto-fetching widget.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.charts.watch(&self.store),
            self.ratios.watch(&self.store),
            self.performance.watch(&self.store),
            self.risk.watch(&self.store),
        ]
    }

    /// Wait for every auto-fetching widget that has something to fetch under
    /// the current filters to reach `Settled` or `Errored`.
    ///
    /// Each widget is waited on for its most recently started cycle. A store
    /// edit made just before this call counts only once its watcher has
    /// picked it up; until then the previous cycle's result satisfies the wait.
    pub async fn settle(&self) {
        let filters = self.store.snapshot();
        let mut pending: Vec<BoxFuture<'_, ()>> = Vec::new();

        if self.charts.widget().params(&filters).is_some() {
            pending.push(Box::pin(async {
                self.charts.wait_settled().await;
            }));
        }
        if self.ratios.widget().params(&filters).is_some() {
            pending.push(Box::pin(async {
                self.ratios.wait_settled().await;
            }));
        }
        if self.performance.widget().params(&filters).is_some() {
            pending.push(Box::pin(async {
                self.performance.wait_settled().await;
            }));
        }
        if self.risk.widget().params(&filters).is_some() {
            pending.push(Box::pin(async {
                self.risk.wait_settled().await;
            }));
        }

        join_all(pending).await;
    }
}
