//! Reactive fetch controllers for the dashboard widgets.
//!
//! Each widget owns a [`FetchOrchestrator`] that watches the shared
//! [`FilterStore`], runs a submit + poll cycle when the filters it depends on
//! change, and publishes a [`WidgetState`]. Every cycle carries a generation
//! token; only the most recently started cycle may write state.

pub mod assistant;
pub mod dashboard;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod widgets;

pub use assistant::QualitativeAssistant;
pub use dashboard::Dashboard;
pub use orchestrator::{CycleOutcome, FetchOrchestrator, Widget};
pub use state::{Phase, WidgetState};
pub use store::FilterStore;
pub use widgets::{ChartsWidget, PerformanceWidget, QualitativeWidget, RatiosWidget, RiskWidget};
