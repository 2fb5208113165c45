//! Plain-text rendering of widget states.

use fetch_orchestrator::{Phase, WidgetState};
use series_builder::{MetricTable, QualitativeAnswer, RiskScore, SeriesMode, SeriesSet, NO_VALUE};
use std::fmt::Write;

fn header<D>(title: &str, state: &WidgetState<D>, out: &mut String) -> bool {
    let _ = writeln!(out, "== {} ==", title);
    match state.phase {
        Phase::Settled => true,
        Phase::Errored => {
            let _ = writeln!(out, "  error: {}", state.error_message().unwrap_or_default());
            false
        }
        Phase::Idle => {
            let _ = writeln!(out, "  (nothing to fetch)");
            false
        }
        Phase::Submitting | Phase::Polling => {
            let _ = writeln!(out, "  (loading)");
            false
        }
    }
}

pub fn charts(state: &WidgetState<SeriesSet>) -> String {
    let mut out = String::new();
    if !header("Charts", state, &mut out) {
        return out;
    }
    let set = &state.data;
    let mode = match set.mode {
        SeriesMode::Line => "line",
        SeriesMode::Candlestick => "candlestick",
    };
    let _ = writeln!(out, "  mode: {}", mode);
    if set.is_empty() {
        let _ = writeln!(out, "  no data");
    }
    for series in &set.series {
        let _ = writeln!(out, "  {}: {} points", series.name, series.points.len());
    }
    if !set.issues.is_empty() {
        let _ = writeln!(out, "  {} row(s) skipped", set.issues.len());
    }
    out
}

pub fn table(title: &str, state: &WidgetState<MetricTable>) -> String {
    let mut out = String::new();
    if !header(title, state, &mut out) {
        return out;
    }
    let table = &state.data;
    if table.is_empty() {
        let _ = writeln!(out, "  no data");
        return out;
    }

    let width = table
        .rows
        .iter()
        .map(|r| r.label.len())
        .max()
        .unwrap_or(0)
        .max(6);
    let _ = write!(out, "  {:width$}", "", width = width);
    for column in &table.columns {
        let _ = write!(out, " {:>10}", column);
    }
    out.push('\n');
    for row in &table.rows {
        let _ = write!(out, "  {:width$}", row.label, width = width);
        for cell in &row.cells {
            let _ = write!(out, " {:>10}", cell.to_string());
        }
        out.push('\n');
    }
    out
}

pub fn risk(state: &WidgetState<Vec<RiskScore>>) -> String {
    let mut out = String::new();
    if !header("Risk", state, &mut out) {
        return out;
    }
    for score in &state.data {
        let band = score
            .band
            .map(|b| format!("{:?}", b).to_lowercase())
            .unwrap_or_else(|| NO_VALUE.to_string());
        let _ = writeln!(out, "  {:<14} {:>8} {}", score.category, score.score.to_string(), band);
    }
    out
}

pub fn answer(state: &WidgetState<Option<QualitativeAnswer>>) -> String {
    let mut out = String::new();
    if !header("Assistant", state, &mut out) {
        return out;
    }
    if let Some(answer) = &state.data {
        let _ = writeln!(out, "  {}", answer.final_response);
        let _ = writeln!(
            out,
            "  faithfulness {:.0}%  relevancy {:.0}%",
            answer.faithfulness_pct(),
            answer.relevancy_pct()
        );
    }
    out
}
