use dashboard_core::catalog::RatioCategory;
use dashboard_core::{CellValue, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::normalize::MetricRow;

/// Rendered in place of a missing or non-numeric cell.
pub const NO_VALUE: &str = "--";

/// A table cell. "No data" and "zero" are different things.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Cell {
    Value(f64),
    #[default]
    NoValue,
}

impl Cell {
    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::NoValue => None,
        }
    }
}

impl From<Option<&CellValue>> for Cell {
    fn from(cell: Option<&CellValue>) -> Self {
        cell.and_then(CellValue::as_f64).map(Cell::Value).unwrap_or(Cell::NoValue)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(v) => write!(f, "{:.2}", v),
            Cell::NoValue => f.write_str(NO_VALUE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct MetricTable {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl MetricTable {
    /// Lay out a mapping-of-mappings (metric → column → value) as a table.
    ///
    /// Rows follow `row_order` and columns follow `columns`; a metric or
    /// column with no entry yields [`Cell::NoValue`] cells.
    pub fn from_nested<R, C>(nested: &BTreeMap<String, Row>, row_order: &[R], columns: &[C]) -> Self
    where
        R: AsRef<str>,
        C: AsRef<str>,
    {
        let rows = row_order
            .iter()
            .map(|label| {
                let label = label.as_ref();
                let values = nested.get(label);
                TableRow {
                    label: label.to_string(),
                    cells: columns
                        .iter()
                        .map(|c| Cell::from(values.and_then(|v| v.get(c.as_ref()))))
                        .collect(),
                }
            })
            .collect();

        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        }
    }

    /// Ratio table. Columns are every period label seen, most recent first.
    /// When `metrics` is given the rows follow it, otherwise payload order.
    pub fn ratios(rows: &[MetricRow], metrics: Option<&[&str]>) -> Self {
        let mut columns: Vec<String> = rows
            .iter()
            .flat_map(|r| r.cells.keys().cloned())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        columns.reverse();

        let nested: BTreeMap<String, Row> = rows
            .iter()
            .map(|r| (r.metric.clone(), r.cells.clone()))
            .collect();

        match metrics {
            Some(order) => Self::from_nested(&nested, order, &columns),
            None => {
                let order: Vec<&str> = rows.iter().map(|r| r.metric.as_str()).collect();
                Self::from_nested(&nested, &order, &columns)
            }
        }
    }

    /// Single-column performance table. Known metrics come first in
    /// catalog order, then anything else the backend sent.
    pub fn performance(values: &Row, known: &[&str], column: &str) -> Self {
        let mut order: Vec<&str> = known.to_vec();
        order.extend(
            values
                .keys()
                .map(String::as_str)
                .filter(|k| !known.iter().any(|m| m.eq_ignore_ascii_case(k))),
        );

        let rows = order
            .into_iter()
            .map(|metric| TableRow {
                label: metric.to_string(),
                cells: vec![Cell::from(lookup(values, metric))],
            })
            .collect();

        Self {
            columns: vec![column.to_string()],
            rows,
        }
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<Cell> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .and_then(|r| r.cells.get(col).copied())
    }

    pub fn is_empty(&self) -> bool {
        self.rows
            .iter()
            .all(|r| r.cells.iter().all(|c| *c == Cell::NoValue))
    }
}

fn lookup<'a>(row: &'a Row, key: &str) -> Option<&'a CellValue> {
    row.get(key).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Heat bucket for a category score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Strong,
    Good,
    Moderate,
    Weak,
    Critical,
}

impl RiskBand {
    /// Bucket a score already scaled to 0..1.
    pub fn classify(fraction: f64) -> Self {
        if fraction > 0.8 {
            RiskBand::Strong
        } else if fraction > 0.6 {
            RiskBand::Good
        } else if fraction > 0.4 {
            RiskBand::Moderate
        } else if fraction > 0.2 {
            RiskBand::Weak
        } else {
            RiskBand::Critical
        }
    }
}

/// Divisor that brings a whole risk payload onto 0..1. The backend reports
/// category scores on a 0..100 scale; a payload counts as fractional only
/// when no score exceeds 1.
fn risk_scale(values: &Row) -> f64 {
    let percent = values
        .values()
        .filter_map(CellValue::as_f64)
        .any(|v| v > 1.0);
    if percent {
        100.0
    } else {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskScore {
    pub category: String,
    pub score: Cell,
    /// `None` when the score is missing
    pub band: Option<RiskBand>,
}

impl RiskScore {
    /// Scores for every ratio category in catalog order, followed by any
    /// extra categories the backend reported.
    pub fn from_values(values: &Row) -> Vec<RiskScore> {
        let scale = risk_scale(values);
        let known: Vec<&str> = RatioCategory::ALL.iter().map(|c| c.name()).collect();
        let extras = values
            .keys()
            .map(String::as_str)
            .filter(|k| !known.iter().any(|c| c.eq_ignore_ascii_case(k)));

        known
            .iter()
            .copied()
            .chain(extras)
            .map(|category| {
                let score = Cell::from(lookup(values, category));
                RiskScore {
                    category: category.to_string(),
                    score,
                    band: score.value().map(|v| RiskBand::classify(v / scale)),
                }
            })
            .collect()
    }
}
