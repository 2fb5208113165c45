use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::catalog::RatioCategory;
use crate::error::TaskError;

/// Bucket size of the returned time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
        Timeframe::Quarterly,
        Timeframe::Yearly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
            Timeframe::Quarterly => "quarterly",
            Timeframe::Yearly => "yearly",
        }
    }

    /// Frequencies at which financial statements are published.
    pub fn is_reporting(&self) -> bool {
        matches!(self, Timeframe::Quarterly | Timeframe::Yearly)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TaskError::InvalidRequest(format!("unknown timeframe '{}'", s)))
    }
}

/// The user's current selections, shared by every widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub company: String,
    pub timeframe: Timeframe,
    /// Chart variables, in display order
    pub variables: Vec<String>,
    pub ratio_category: RatioCategory,
    /// Statement frequency for the ratios table, quarterly or yearly
    pub ratio_timeframe: Timeframe,
    /// Quarter or year token, e.g. `Q1_2024` or `2024`
    pub analysis_period: String,
    /// Draft question for the qualitative assistant
    pub query: String,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            company: "Apple Inc.".to_string(),
            timeframe: Timeframe::Daily,
            variables: vec!["Close".to_string()],
            ratio_category: RatioCategory::Valuation,
            ratio_timeframe: Timeframe::Quarterly,
            analysis_period: "Q4_2023".to_string(),
            query: String::new(),
        }
    }
}

impl FilterSelection {
    /// Replace the chart variables, trimming blanks and dropping
    /// case-insensitive duplicates while keeping first-seen order.
    pub fn set_variables<I, S>(&mut self, variables: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.variables = normalize_variables(variables);
    }
}

pub fn normalize_variables<I, S>(variables: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for v in variables {
        let v = v.as_ref().trim();
        if v.is_empty() || out.iter().any(|seen| seen.eq_ignore_ascii_case(v)) {
            continue;
        }
        out.push(v.to_string());
    }
    out
}

/// Opaque identifier handed out by the backend job queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted task together with the parameters it was submitted for.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHandle<P> {
    pub task_id: TaskId,
    pub submitted: P,
}

/// One backend capability invocation, already validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskRequest {
    Charts {
        company: String,
        timeframe: Timeframe,
        variables: Vec<String>,
    },
    Ratios {
        company: String,
        timeframe: Timeframe,
        variables: Vec<String>,
    },
    RiskMatrix {
        company: String,
        period: String,
        timeframe: Timeframe,
        top_n: u32,
    },
    Performance {
        company: String,
        period: String,
        timeframe: Timeframe,
    },
    Qualitative {
        company: String,
        period: String,
        query: String,
    },
}

impl TaskRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskRequest::Charts { .. } => "charts",
            TaskRequest::Ratios { .. } => "ratios",
            TaskRequest::RiskMatrix { .. } => "risk_matrix",
            TaskRequest::Performance { .. } => "performance",
            TaskRequest::Qualitative { .. } => "qualitative",
        }
    }

    pub fn company(&self) -> &str {
        match self {
            TaskRequest::Charts { company, .. }
            | TaskRequest::Ratios { company, .. }
            | TaskRequest::RiskMatrix { company, .. }
            | TaskRequest::Performance { company, .. }
            | TaskRequest::Qualitative { company, .. } => company,
        }
    }
}

/// Raw `task-status` response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskEnvelope {
    pub fn processing() -> Self {
        Self {
            status: "processing".to_string(),
            data: None,
            error: None,
        }
    }

    pub fn completed(data: serde_json::Value) -> Self {
        Self {
            status: "completed".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            data: None,
            error: Some(error.into()),
        }
    }

    /// Interpret the envelope. Queue states other than completed/failed
    /// (`processing`, `RETRY`, ...) all mean "not done yet".
    pub fn into_status(self) -> TaskStatus {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" => TaskStatus::Completed(self.data.unwrap_or(serde_json::Value::Null)),
            "failed" => TaskStatus::Failed(self.error.unwrap_or_else(|| "task failed".to_string())),
            _ => TaskStatus::Processing,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Processing,
    Completed(serde_json::Value),
    Failed(String),
}

/// A single loosely-typed cell as delivered by the backend
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Null,
}

impl CellValue {
    /// Numeric coercion. Only finite numbers and numeric strings count;
    /// null, blank text and NaN/inf yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            CellValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<&serde_json::Value> for CellValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Null,
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Null),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// Column name to cell, one per time bucket or metric.
pub type Row = BTreeMap<String, CellValue>;

/// Identity of one fetch cycle. Results are only committed while the
/// token is still the latest one issued by its [`GenerationCounter`].
#[derive(Debug, Clone)]
pub struct CycleToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl CycleToken {
    /// A token that never goes stale, for one-off polls.
    pub fn detached() -> Self {
        Self {
            generation: 0,
            current: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier token.
    pub fn advance(&self) -> CycleToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        CycleToken {
            generation,
            current: self.current.clone(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("Quarterly".parse::<Timeframe>().unwrap(), Timeframe::Quarterly);
        assert_eq!(" daily ".parse::<Timeframe>().unwrap(), Timeframe::Daily);
        assert!(Timeframe::Yearly.is_reporting());
        assert!(!Timeframe::Daily.is_reporting());
        assert!("hourly".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_variables_dedup_keeps_order() {
        let vars = normalize_variables(["Close", " open", "", "close", "High"]);
        assert_eq!(vars, vec!["Close", "open", "High"]);
    }

    #[test]
    fn test_envelope_status() {
        assert_eq!(TaskEnvelope::processing().into_status(), TaskStatus::Processing);

        let done = TaskEnvelope::completed(json!([1, 2])).into_status();
        assert_eq!(done, TaskStatus::Completed(json!([1, 2])));

        let failed: TaskEnvelope = serde_json::from_value(json!({"status": "failed"})).unwrap();
        assert_eq!(failed.into_status(), TaskStatus::Failed("task failed".to_string()));

        let retry: TaskEnvelope = serde_json::from_value(json!({"status": "RETRY"})).unwrap();
        assert_eq!(retry.into_status(), TaskStatus::Processing);

        let no_data: TaskEnvelope = serde_json::from_value(json!({"status": "completed"})).unwrap();
        assert_eq!(no_data.into_status(), TaskStatus::Completed(serde_json::Value::Null));
    }

    #[test]
    fn test_cell_coercion() {
        assert_eq!(CellValue::from(&json!(1.5)).as_f64(), Some(1.5));
        assert_eq!(CellValue::from(&json!("42")).as_f64(), Some(42.0));
        assert_eq!(CellValue::from(&json!("n/a")).as_f64(), None);
        assert_eq!(CellValue::from(&json!("")).as_f64(), None);
        assert_eq!(CellValue::from(&json!(null)).as_f64(), None);
        assert_eq!(CellValue::Text("NaN".into()).as_f64(), None);
    }

    #[test]
    fn test_generation_tokens() {
        let counter = GenerationCounter::new();
        let first = counter.advance();
        assert!(first.is_current());

        let second = counter.advance();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(counter.current(), second.generation());

        assert!(CycleToken::detached().is_current());
    }
}
