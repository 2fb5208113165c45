use dashboard_core::{CellValue, Row};
use serde::Serialize;

use crate::normalize::{parse_timestamp, DATE_KEY};

const OHLC: [&str; 4] = ["open", "high", "low", "close"];
const DEFAULT_INSTRUMENT: &str = "Price";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesMode {
    Line,
    Candlestick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PointValue {
    Scalar(f64),
    /// `[open, high, low, close]`
    Ohlc([f64; 4]),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    /// Epoch milliseconds
    pub x: i64,
    pub y: PointValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<Point>,
}

/// Row-level problem found while building series. The offending point is
/// left out of the series; everything else is still plotted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum DataIssue {
    MissingDate { row: usize },
    InvalidDate { row: usize, value: String },
    NonNumeric { row: usize, field: String },
    /// x went backwards; the point is kept
    NonMonotonic { row: usize, series: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSet {
    pub mode: SeriesMode,
    pub series: Vec<Series>,
    pub issues: Vec<DataIssue>,
}

impl Default for SeriesSet {
    fn default() -> Self {
        Self {
            mode: SeriesMode::Line,
            series: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl SeriesSet {
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Candlestick mode needs exactly the four OHLC variables, in any order and
/// case. Adding or dropping any variable falls back to line mode.
pub fn is_candle<S: AsRef<str>>(variables: &[S]) -> bool {
    if variables.len() != OHLC.len() {
        return false;
    }
    let lower: Vec<String> = variables.iter().map(|v| v.as_ref().to_ascii_lowercase()).collect();
    OHLC.iter().all(|f| lower.iter().any(|v| v == f))
}

/// Build series with the candlestick series named `Price`.
pub fn build_series<S: AsRef<str>>(rows: &[Row], variables: &[S]) -> SeriesSet {
    build_series_for(DEFAULT_INSTRUMENT, rows, variables)
}

/// Build plot-ready series from chart rows. The candlestick series, when
/// selected, is named after `instrument`.
pub fn build_series_for<S: AsRef<str>>(instrument: &str, rows: &[Row], variables: &[S]) -> SeriesSet {
    let mut issues = Vec::new();
    let xs: Vec<Option<i64>> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| row_timestamp(i, row, &mut issues))
        .collect();

    if is_candle(variables) {
        let mut points = Vec::with_capacity(rows.len());
        for (i, (row, x)) in rows.iter().zip(&xs).enumerate() {
            let Some(x) = *x else { continue };
            let mut ohlc = [0.0; 4];
            let mut complete = true;
            for (slot, field) in ohlc.iter_mut().zip(OHLC) {
                match lookup(row, field).and_then(CellValue::as_f64) {
                    Some(v) => *slot = v,
                    None => {
                        issues.push(DataIssue::NonNumeric { row: i, field: canonical_ohlc(field) });
                        complete = false;
                    }
                }
            }
            if complete {
                push_point(&mut points, &mut issues, instrument, i, x, PointValue::Ohlc(ohlc));
            }
        }
        return SeriesSet {
            mode: SeriesMode::Candlestick,
            series: vec![Series { name: instrument.to_string(), points }],
            issues,
        };
    }

    let mut series = Vec::with_capacity(variables.len());
    for var in variables {
        let name = var.as_ref();
        let mut points = Vec::with_capacity(rows.len());
        for (i, (row, x)) in rows.iter().zip(&xs).enumerate() {
            let Some(x) = *x else { continue };
            match lookup(row, name).and_then(CellValue::as_f64) {
                Some(y) => push_point(&mut points, &mut issues, name, i, x, PointValue::Scalar(y)),
                None => issues.push(DataIssue::NonNumeric { row: i, field: name.to_string() }),
            }
        }
        series.push(Series { name: name.to_string(), points });
    }

    SeriesSet {
        mode: SeriesMode::Line,
        series,
        issues,
    }
}

fn row_timestamp(i: usize, row: &Row, issues: &mut Vec<DataIssue>) -> Option<i64> {
    match row.get(DATE_KEY) {
        None | Some(CellValue::Null) => {
            issues.push(DataIssue::MissingDate { row: i });
            None
        }
        Some(cell) => {
            let ts = parse_timestamp(cell);
            if ts.is_none() {
                let value = match cell {
                    CellValue::Text(s) => s.clone(),
                    CellValue::Number(n) => n.to_string(),
                    CellValue::Null => String::new(),
                };
                issues.push(DataIssue::InvalidDate { row: i, value });
            }
            ts
        }
    }
}

/// Exact key first, then a case-insensitive match.
fn lookup<'a>(row: &'a Row, field: &str) -> Option<&'a CellValue> {
    row.get(field).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    })
}

fn canonical_ohlc(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn push_point(
    points: &mut Vec<Point>,
    issues: &mut Vec<DataIssue>,
    series: &str,
    row: usize,
    x: i64,
    y: PointValue,
) {
    if points.last().is_some_and(|p| x < p.x) {
        issues.push(DataIssue::NonMonotonic { row, series: series.to_string() });
    }
    points.push(Point { x, y });
}
