//! The five dashboard widgets.

use async_trait::async_trait;
use dashboard_core::catalog::{RatioCategory, PERFORMANCE_METRICS};
use dashboard_core::{AnalysisPeriod, FilterSelection, TaskError, TaskId, Timeframe};
use serde_json::Value;
use series_builder::normalize::{chart_rows, metric_rows, performance_values, risk_values};
use series_builder::{build_series_for, MetricTable, QualitativeAnswer, RiskScore, SeriesSet};
use task_client::TaskClient;

use crate::orchestrator::Widget;

fn company_of(filters: &FilterSelection) -> Option<String> {
    let company = filters.company.trim();
    (!company.is_empty()).then(|| company.to_string())
}

fn period_of(filters: &FilterSelection) -> Option<AnalysisPeriod> {
    match filters.analysis_period.parse() {
        Ok(period) => Some(period),
        Err(e) => {
            tracing::warn!("{}", e);
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartParams {
    pub company: String,
    pub timeframe: Timeframe,
    pub variables: Vec<String>,
}

/// Price and volume chart. Candlestick when exactly OHLC is selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartsWidget;

#[async_trait]
impl Widget for ChartsWidget {
    type Params = ChartParams;
    type Data = SeriesSet;

    fn name(&self) -> &'static str {
        "charts"
    }

    fn params(&self, filters: &FilterSelection) -> Option<ChartParams> {
        if filters.variables.is_empty() {
            return None;
        }
        Some(ChartParams {
            company: company_of(filters)?,
            timeframe: filters.timeframe,
            variables: filters.variables.clone(),
        })
    }

    async fn submit(&self, client: &TaskClient, p: &ChartParams) -> Result<TaskId, TaskError> {
        client
            .submit_charts_task(&p.company, p.timeframe, &p.variables)
            .await
    }

    fn decode(&self, p: &ChartParams, payload: Value) -> Result<SeriesSet, TaskError> {
        let rows = chart_rows(&payload)?;
        let set = build_series_for(&p.company, &rows, &p.variables);
        for issue in &set.issues {
            tracing::warn!("charts for {}: {:?}", p.company, issue);
        }
        Ok(set)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatioParams {
    pub company: String,
    pub timeframe: Timeframe,
    pub category: RatioCategory,
}

/// Financial ratios of the selected category, one column per period.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatiosWidget;

#[async_trait]
impl Widget for RatiosWidget {
    type Params = RatioParams;
    type Data = MetricTable;

    fn name(&self) -> &'static str {
        "ratios"
    }

    fn params(&self, filters: &FilterSelection) -> Option<RatioParams> {
        if !filters.ratio_timeframe.is_reporting() {
            tracing::warn!("ratios are only published quarterly or yearly, not {}", filters.ratio_timeframe);
            return None;
        }
        Some(RatioParams {
            company: company_of(filters)?,
            timeframe: filters.ratio_timeframe,
            category: filters.ratio_category,
        })
    }

    async fn submit(&self, client: &TaskClient, p: &RatioParams) -> Result<TaskId, TaskError> {
        let variables: Vec<String> = p.category.ratios().iter().map(|r| r.to_string()).collect();
        client
            .submit_ratios_task(&p.company, p.timeframe, &variables)
            .await
    }

    fn decode(&self, p: &RatioParams, payload: Value) -> Result<MetricTable, TaskError> {
        let rows = metric_rows(&payload)?;
        Ok(MetricTable::ratios(&rows, Some(p.category.ratios())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodParams {
    pub company: String,
    pub period: AnalysisPeriod,
}

/// Risk-adjusted performance metrics for one analysis period.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceWidget;

#[async_trait]
impl Widget for PerformanceWidget {
    type Params = PeriodParams;
    type Data = MetricTable;

    fn name(&self) -> &'static str {
        "performance"
    }

    fn params(&self, filters: &FilterSelection) -> Option<PeriodParams> {
        Some(PeriodParams {
            company: company_of(filters)?,
            period: period_of(filters)?,
        })
    }

    async fn submit(&self, client: &TaskClient, p: &PeriodParams) -> Result<TaskId, TaskError> {
        client
            .submit_performance_task(&p.company, &p.period.token(), p.period.timeframe())
            .await
    }

    fn decode(&self, p: &PeriodParams, payload: Value) -> Result<MetricTable, TaskError> {
        let values = performance_values(&payload)?;
        Ok(MetricTable::performance(
            &values,
            PERFORMANCE_METRICS,
            &p.period.column_label(),
        ))
    }
}

/// Risk matrix: one score and band per ratio category.
#[derive(Debug, Clone, Copy)]
pub struct RiskWidget {
    pub top_n: u32,
}

impl Default for RiskWidget {
    fn default() -> Self {
        Self {
            top_n: task_client::config::DEFAULT_RISK_TOP_N,
        }
    }
}

#[async_trait]
impl Widget for RiskWidget {
    type Params = PeriodParams;
    type Data = Vec<RiskScore>;

    fn name(&self) -> &'static str {
        "risk"
    }

    fn params(&self, filters: &FilterSelection) -> Option<PeriodParams> {
        Some(PeriodParams {
            company: company_of(filters)?,
            period: period_of(filters)?,
        })
    }

    async fn submit(&self, client: &TaskClient, p: &PeriodParams) -> Result<TaskId, TaskError> {
        client
            .submit_risk_matrix_task(&p.company, &p.period.token(), p.period.timeframe(), self.top_n)
            .await
    }

    fn decode(&self, _p: &PeriodParams, payload: Value) -> Result<Vec<RiskScore>, TaskError> {
        let values = risk_values(&payload)?;
        Ok(RiskScore::from_values(&values))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionParams {
    pub company: String,
    pub period: AnalysisPeriod,
    pub query: String,
}

/// Question answering over the company's filings. Submitted on demand by
/// [`crate::QualitativeAssistant`], never by the filter watcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualitativeWidget;

#[async_trait]
impl Widget for QualitativeWidget {
    type Params = QuestionParams;
    type Data = Option<QualitativeAnswer>;

    fn name(&self) -> &'static str {
        "qualitative"
    }

    fn params(&self, filters: &FilterSelection) -> Option<QuestionParams> {
        let query = filters.query.trim();
        if query.is_empty() {
            return None;
        }
        Some(QuestionParams {
            company: company_of(filters)?,
            period: period_of(filters)?,
            query: query.to_string(),
        })
    }

    async fn submit(&self, client: &TaskClient, p: &QuestionParams) -> Result<TaskId, TaskError> {
        client
            .submit_qualitative_task(&p.company, &p.period.token(), &p.query)
            .await
    }

    fn decode(&self, _p: &QuestionParams, payload: Value) -> Result<Option<QualitativeAnswer>, TaskError> {
        QualitativeAnswer::from_payload(payload).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::TaskRequest;
    use serde_json::json;
    use series_builder::{Cell, RiskBand, SeriesMode};
    use std::sync::Arc;
    use std::time::Duration;
    use task_client::testing::ScriptedBackend;
    use task_client::PollSettings;

    fn client(backend: &Arc<ScriptedBackend>) -> TaskClient {
        TaskClient::new(
            backend.clone(),
            PollSettings {
                interval: Duration::from_millis(10),
                max_attempts: 5,
            },
        )
    }

    fn filters() -> FilterSelection {
        FilterSelection {
            company: "Apple Inc.".to_string(),
            analysis_period: "Q1_2024".to_string(),
            ..FilterSelection::default()
        }
    }

    #[test]
    fn test_governing_params() {
        let f = filters();
        assert!(ChartsWidget.params(&f).is_some());
        assert!(QualitativeWidget.params(&f).is_none());

        let mut blank = f.clone();
        blank.company = " ".to_string();
        assert!(RatiosWidget.params(&blank).is_none());

        let mut bad_period = f.clone();
        bad_period.analysis_period = "FY2024".to_string();
        assert!(PerformanceWidget.params(&bad_period).is_none());

        // Query text does not govern the auto-fetching widgets
        let mut asked = f.clone();
        asked.query = "What are the main risks?".to_string();
        assert_eq!(RiskWidget::default().params(&asked), RiskWidget::default().params(&f));
        assert_eq!(
            QualitativeWidget.params(&asked).map(|p| p.query),
            Some("What are the main risks?".to_string())
        );
    }

    #[tokio::test]
    async fn test_period_widgets_derive_timeframe() {
        let backend = Arc::new(ScriptedBackend::new());
        let client = client(&backend);
        let p = PerformanceWidget.params(&filters()).unwrap();

        PerformanceWidget.submit(&client, &p).await.unwrap();
        RiskWidget { top_n: 3 }.submit(&client, &p).await.unwrap();

        assert_eq!(
            backend.submissions(),
            vec![
                TaskRequest::Performance {
                    company: "Apple Inc.".to_string(),
                    period: "Q1_2024".to_string(),
                    timeframe: Timeframe::Quarterly,
                },
                TaskRequest::RiskMatrix {
                    company: "Apple Inc.".to_string(),
                    period: "Q1_2024".to_string(),
                    timeframe: Timeframe::Quarterly,
                    top_n: 3,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_ratios_use_statement_timeframe() {
        let backend = Arc::new(ScriptedBackend::new());
        let defaults = FilterSelection::default();
        assert_eq!(defaults.timeframe, Timeframe::Daily);

        let p = RatiosWidget.params(&defaults).unwrap();
        RatiosWidget.submit(&client(&backend), &p).await.unwrap();
        match &backend.submissions()[0] {
            TaskRequest::Ratios { timeframe, .. } => assert_eq!(*timeframe, Timeframe::Quarterly),
            other => panic!("unexpected request {:?}", other),
        }

        // The chart timeframe does not govern ratios
        let mut weekly = defaults.clone();
        weekly.timeframe = Timeframe::Weekly;
        assert_eq!(RatiosWidget.params(&weekly), Some(p));

        let mut daily_ratios = defaults;
        daily_ratios.ratio_timeframe = Timeframe::Daily;
        assert!(RatiosWidget.params(&daily_ratios).is_none());
    }

    #[tokio::test]
    async fn test_ratios_submit_category_variables() {
        let backend = Arc::new(ScriptedBackend::new());
        let mut f = filters();
        f.ratio_category = RatioCategory::Liquidity;
        let p = RatiosWidget.params(&f).unwrap();

        RatiosWidget.submit(&client(&backend), &p).await.unwrap();

        match &backend.submissions()[0] {
            TaskRequest::Ratios { variables, .. } => {
                assert_eq!(variables.len(), RatioCategory::Liquidity.ratios().len())
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_charts_decode_candlestick_named_for_company() {
        let f = FilterSelection {
            variables: vec!["Open".into(), "High".into(), "Low".into(), "Close".into()],
            ..filters()
        };
        let p = ChartsWidget.params(&f).unwrap();
        let set = ChartsWidget
            .decode(
                &p,
                json!([{"date": "2024-01-01", "Open": 1, "High": 2, "Low": 0.5, "Close": 1.5}]),
            )
            .unwrap();

        assert_eq!(set.mode, SeriesMode::Candlestick);
        assert_eq!(set.series.len(), 1);
        assert_eq!(set.series[0].name, "Apple Inc.");
    }

    #[test]
    fn test_performance_decode_uses_period_column() {
        let p = PerformanceWidget.params(&filters()).unwrap();
        let table = PerformanceWidget
            .decode(&p, json!([{"index": "2024Q1", "Beta": 1.2, "Alpha": null}]))
            .unwrap();

        assert_eq!(table.columns, vec!["2024Q1"]);
        assert_eq!(table.cell("Beta", "2024Q1"), Some(Cell::Value(1.2)));
        assert_eq!(table.cell("Alpha", "2024Q1"), Some(Cell::NoValue));
        assert_eq!(table.rows.len(), PERFORMANCE_METRICS.len());
    }

    #[test]
    fn test_risk_decode_bands() {
        let p = RiskWidget::default().params(&filters()).unwrap();
        let scores = RiskWidget::default()
            .decode(&p, json!({"Valuation": 85, "Liquidity": 35}))
            .unwrap();

        assert_eq!(scores[0].category, "Valuation");
        assert_eq!(scores[0].band, Some(RiskBand::Strong));
        let liquidity = scores.iter().find(|s| s.category == "Liquidity").unwrap();
        assert_eq!(liquidity.band, Some(RiskBand::Weak));
        let leverage = scores.iter().find(|s| s.category == "Leverage").unwrap();
        assert_eq!(leverage.score, Cell::NoValue);
        assert_eq!(leverage.band, None);
    }

    #[test]
    fn test_qualitative_decode_requires_response() {
        let p = QualitativeWidget
            .params(&FilterSelection {
                query: "Summarize guidance".to_string(),
                ..filters()
            })
            .unwrap();
        let err = QualitativeWidget.decode(&p, json!({"audit_score": {}})).unwrap_err();
        assert!(matches!(err, TaskError::DataShape(_)));
    }
}
