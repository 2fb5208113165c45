//! Fixed selector contents shared by the widgets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TaskError;

pub const COMPANIES: &[&str] = &[
    "Apple Inc.",
    "MICROSOFT CORP",
    "Alphabet Inc.",
    "AMAZON COM INC.",
    "Meta Platforms, Inc.",
    "NVIDIA CORP",
    "Tesla, Inc.",
    "ORACLE CORP",
    "Salesforce, Inc.",
    "NETFLIX INC",
    "ADOBE INC.",
];

pub const CHART_VARIABLES: &[&str] = &[
    "Adjusted Close",
    "High",
    "Close",
    "Return",
    "Open",
    "Volume",
    "Cumulative Return",
    "Volatility",
    "Dividends",
    "Low",
];

pub const PERFORMANCE_METRICS: &[&str] = &[
    "Beta",
    "CAPM",
    "Alpha",
    "Sharpe Ratio",
    "Sortino Ratio",
    "Tracking Error",
    "Treynor Ratio",
];

pub const PERIOD_QUARTERS: &[&str] = &["Q1_2024", "Q2_2024", "Q3_2024", "Q1_2025", "Q2_2025", "Q3_2025"];
pub const PERIOD_YEARS: &[&str] = &["2024", "2025"];

/// Top-level grouping of financial ratios; also the risk score categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RatioCategory {
    #[default]
    Valuation,
    Profitability,
    Liquidity,
    Efficiency,
    Leverage,
    #[serde(rename = "Cash Flow")]
    CashFlow,
}

impl RatioCategory {
    pub const ALL: [RatioCategory; 6] = [
        RatioCategory::Valuation,
        RatioCategory::Profitability,
        RatioCategory::Liquidity,
        RatioCategory::Efficiency,
        RatioCategory::Leverage,
        RatioCategory::CashFlow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RatioCategory::Valuation => "Valuation",
            RatioCategory::Profitability => "Profitability",
            RatioCategory::Liquidity => "Liquidity",
            RatioCategory::Efficiency => "Efficiency",
            RatioCategory::Leverage => "Leverage",
            RatioCategory::CashFlow => "Cash Flow",
        }
    }

    pub fn ratios(&self) -> &'static [&'static str] {
        match self {
            RatioCategory::Valuation => &[
                "Price-to-Earnings",
                "Price-to-Book",
                "EV-to-EBITDA",
                "EV-to-Sales",
                "Price-to-Free-Cash-Flow",
            ],
            RatioCategory::Profitability => &[
                "Gross Margin",
                "Operating Margin",
                "Net Profit Margin",
                "Return on Equity",
            ],
            RatioCategory::Liquidity => &["Current Ratio", "Quick Ratio", "Cash Ratio"],
            RatioCategory::Efficiency => &["Asset Turnover Ratio", "Inventory Turnover Ratio"],
            RatioCategory::Leverage => &["Debt-to-Equity Ratio", "Debt-to-Assets Ratio"],
            RatioCategory::CashFlow => &["Cash Conversion Efficiency", "CAPEX Coverage Ratio"],
        }
    }
}

impl fmt::Display for RatioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RatioCategory {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], " ");
        RatioCategory::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| TaskError::InvalidRequest(format!("unknown ratio category '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_lookup() {
        assert_eq!("cash_flow".parse::<RatioCategory>().unwrap(), RatioCategory::CashFlow);
        assert_eq!("Liquidity".parse::<RatioCategory>().unwrap(), RatioCategory::Liquidity);
        assert!("Momentum".parse::<RatioCategory>().is_err());
        assert_eq!(RatioCategory::Liquidity.ratios().len(), 3);
    }
}
