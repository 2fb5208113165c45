use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TaskError;
use crate::types::Timeframe;

/// A reporting period token as selected in the dashboard:
/// `Q<n>_<yyyy>` for a fiscal quarter, `<yyyy>` for a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisPeriod {
    Quarter { quarter: u8, year: i32 },
    Year(i32),
}

impl AnalysisPeriod {
    pub fn timeframe(&self) -> Timeframe {
        match self {
            AnalysisPeriod::Quarter { .. } => Timeframe::Quarterly,
            AnalysisPeriod::Year(_) => Timeframe::Yearly,
        }
    }

    /// Token sent to the backend (`Q1_2024`, `2024`)
    pub fn token(&self) -> String {
        match self {
            AnalysisPeriod::Quarter { quarter, year } => format!("Q{}_{}", quarter, year),
            AnalysisPeriod::Year(year) => year.to_string(),
        }
    }

    /// Human label for selectors (`Q1 2024`)
    pub fn display_label(&self) -> String {
        match self {
            AnalysisPeriod::Quarter { quarter, year } => format!("Q{} {}", quarter, year),
            AnalysisPeriod::Year(year) => year.to_string(),
        }
    }

    /// Column label the backend uses in period-indexed tables (`2024Q1`)
    pub fn column_label(&self) -> String {
        match self {
            AnalysisPeriod::Quarter { quarter, year } => format!("{}Q{}", year, quarter),
            AnalysisPeriod::Year(year) => year.to_string(),
        }
    }
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

impl FromStr for AnalysisPeriod {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || TaskError::InvalidRequest(format!("invalid analysis period '{}'", s));

        if let Some(year) = parse_year(raw) {
            return Ok(AnalysisPeriod::Year(year));
        }

        // Q1_2024, Q1 2024
        let upper = raw.to_ascii_uppercase();
        let rest = upper.strip_prefix('Q').ok_or_else(invalid)?;
        let (q, year) = rest.split_once(['_', ' ']).ok_or_else(invalid)?;
        let quarter: u8 = q.parse().map_err(|_| invalid())?;
        if !(1..=4).contains(&quarter) {
            return Err(invalid());
        }
        let year = parse_year(year.trim()).ok_or_else(invalid)?;
        Ok(AnalysisPeriod::Quarter { quarter, year })
    }
}
