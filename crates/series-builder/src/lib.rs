//! Turns task payloads into plot-ready series and render-ready tables.
//!
//! Everything here is pure: the same payload always produces the same
//! structure. Backend key drift is absorbed in [`normalize`]; the builders
//! only ever see canonical rows.

pub mod answer;
pub mod normalize;
pub mod series;
pub mod tables;

pub use answer::QualitativeAnswer;
pub use normalize::{parse_timestamp, MetricRow};
pub use series::{
    build_series, build_series_for, is_candle, DataIssue, Point, PointValue, Series, SeriesMode,
    SeriesSet,
};
pub use tables::{Cell, MetricTable, RiskBand, RiskScore, TableRow, NO_VALUE};
