//! Canonical row shapes for every payload kind the backend returns.
//!
//! The backend serializes dataframes with whatever index name pandas picked
//! (`date`, `index`, `metric`, `level_0`, ...). Each function here maps one
//! payload kind onto a single shape so the rest of the crate never has to
//! guess keys.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use dashboard_core::{CellValue, Row, TaskError};
use serde_json::Value;

pub const DATE_KEY: &str = "date";

const DATE_KEYS: &[&str] = &["date", "Date", "index"];
const METRIC_KEYS: &[&str] = &["metric", "index", "level_0", "Ratio", "ratio"];
const PERIOD_INDEX_KEYS: &[&str] = &["index", "date", "period", "level_0"];

/// One table row keyed by metric name, cells keyed by column label.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub metric: String,
    pub cells: Row,
}

fn object_to_row(obj: &serde_json::Map<String, Value>) -> Row {
    obj.iter().map(|(k, v)| (k.clone(), CellValue::from(v))).collect()
}

fn take_key(row: &mut Row, candidates: &[&str]) -> Option<CellValue> {
    candidates.iter().find_map(|k| row.remove(*k))
}

fn cell_label(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        CellValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a date cell into epoch milliseconds (UTC).
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and bare
/// `YYYY-MM-DD`. Numeric cells are taken as epoch milliseconds already.
pub fn parse_timestamp(cell: &CellValue) -> Option<i64> {
    let s = match cell {
        CellValue::Number(n) if n.is_finite() => return Some(*n as i64),
        CellValue::Text(s) => s.trim(),
        _ => return None,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Chart payload: an array of `{date, <variable>: number, ...}` records.
///
/// The date column is stored under [`DATE_KEY`] whatever it was called on the
/// wire, and rows are stably sorted by date so x is monotonic downstream.
/// Rows whose date does not parse keep their relative order at the end.
pub fn chart_rows(payload: &Value) -> Result<Vec<Row>, TaskError> {
    let items = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(TaskError::DataShape(format!(
                "chart payload must be an array of rows, got {}",
                json_kind(other)
            )))
        }
    };

    let mut rows: Vec<Row> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            tracing::warn!("Skipping chart row {}: not an object", i);
            continue;
        };
        let mut row = object_to_row(obj);
        if let Some(date) = take_key(&mut row, DATE_KEYS) {
            row.insert(DATE_KEY.to_string(), date);
        }
        rows.push(row);
    }

    let keyed: Vec<Option<i64>> = rows
        .iter()
        .map(|r| r.get(DATE_KEY).and_then(parse_timestamp))
        .collect();
    let sorted = keyed.windows(2).all(|w| match (w[0], w[1]) {
        (Some(a), Some(b)) => a <= b,
        (None, Some(_)) => false,
        _ => true,
    });

    if !sorted {
        tracing::warn!("Chart rows arrived out of date order; sorting {} rows", rows.len());
        let mut paired: Vec<(Option<i64>, Row)> = keyed.into_iter().zip(rows).collect();
        paired.sort_by_key(|(ts, _)| (ts.is_none(), ts.unwrap_or_default()));
        rows = paired.into_iter().map(|(_, r)| r).collect();
    }

    Ok(rows)
}

/// Ratio payload: either an array of `{metric|index: name, <period>: v}`
/// records or a mapping of metric name to `{<period>: v}`.
pub fn metric_rows(payload: &Value) -> Result<Vec<MetricRow>, TaskError> {
    match payload {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let Some(obj) = item.as_object() else {
                    tracing::warn!("Skipping ratio row {}: not an object", i);
                    continue;
                };
                let mut cells = object_to_row(obj);
                let metric = take_key(&mut cells, METRIC_KEYS).as_ref().and_then(cell_label);
                match metric {
                    Some(metric) => out.push(MetricRow { metric, cells }),
                    None => tracing::warn!("Skipping ratio row {}: no metric name", i),
                }
            }
            Ok(out)
        }
        Value::Object(map) => Ok(map
            .iter()
            .map(|(metric, cells)| MetricRow {
                metric: metric.clone(),
                cells: cells.as_object().map(object_to_row).unwrap_or_default(),
            })
            .collect()),
        other => Err(TaskError::DataShape(format!(
            "ratio payload must be rows or a mapping, got {}",
            json_kind(other)
        ))),
    }
}

/// Performance payload: an array holding one `{index: period, metric: v}`
/// record, or the flat `{metric: v}` mapping itself.
pub fn performance_values(payload: &Value) -> Result<Row, TaskError> {
    let obj = match payload {
        Value::Null => return Ok(Row::new()),
        Value::Array(items) => {
            if items.len() > 1 {
                tracing::warn!("Performance payload has {} rows; using the first", items.len());
            }
            match items.first() {
                None => return Ok(Row::new()),
                Some(Value::Object(obj)) => obj,
                Some(other) => {
                    return Err(TaskError::DataShape(format!(
                        "performance row must be an object, got {}",
                        json_kind(other)
                    )))
                }
            }
        }
        Value::Object(obj) => obj,
        other => {
            return Err(TaskError::DataShape(format!(
                "performance payload must be a row or mapping, got {}",
                json_kind(other)
            )))
        }
    };

    let mut row = object_to_row(obj);
    for key in PERIOD_INDEX_KEYS {
        row.remove(*key);
    }
    Ok(row)
}

/// Risk payload: flat mapping of category to score.
pub fn risk_values(payload: &Value) -> Result<Row, TaskError> {
    match payload {
        Value::Null => Ok(Row::new()),
        Value::Object(obj) => Ok(object_to_row(obj)),
        other => Err(TaskError::DataShape(format!(
            "risk payload must be a mapping of category to score, got {}",
            json_kind(other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
