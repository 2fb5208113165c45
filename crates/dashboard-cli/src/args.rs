use anyhow::{bail, Context, Result};
use dashboard_core::catalog::RatioCategory;
use dashboard_core::{AnalysisPeriod, FilterSelection, Timeframe};

pub const USAGE: &str = "\
Usage:
  dashboard-cli --company <name> [--timeframe <daily|weekly|monthly|quarterly|yearly>]
                [--variables <v1> <v2> ...] [--period <Q1_2024|2024>]
                [--category <ratio category>] [--ratio-timeframe <quarterly|yearly>]
                [--query <question>]";

/// Filter overrides from the command line. Anything not given keeps the
/// dashboard default.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub company: Option<String>,
    pub timeframe: Option<Timeframe>,
    pub variables: Option<Vec<String>>,
    pub period: Option<AnalysisPeriod>,
    pub category: Option<RatioCategory>,
    pub ratio_timeframe: Option<Timeframe>,
    pub query: Option<String>,
    pub help: bool,
}

fn value_of<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => match args.get(i + 1) {
            Some(v) if !v.starts_with("--") => Ok(Some(v.as_str())),
            _ => bail!("{} requires a value", flag),
        },
    }
}

impl CliArgs {
    /// Parse everything after the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let help = args.iter().any(|a| a == "--help" || a == "-h");

        let timeframe = value_of(args, "--timeframe")?
            .map(|v| v.parse::<Timeframe>())
            .transpose()
            .context("--timeframe")?;
        let period = value_of(args, "--period")?
            .map(|v| v.parse::<AnalysisPeriod>())
            .transpose()
            .context("--period")?;
        let category = value_of(args, "--category")?
            .map(|v| v.parse::<RatioCategory>())
            .transpose()
            .context("--category")?;
        let ratio_timeframe = value_of(args, "--ratio-timeframe")?
            .map(|v| v.parse::<Timeframe>())
            .transpose()
            .context("--ratio-timeframe")?;
        if ratio_timeframe.is_some_and(|tf| !tf.is_reporting()) {
            bail!("--ratio-timeframe must be quarterly or yearly");
        }

        // --variables takes every value up to the next flag
        let variables = match args.iter().position(|a| a == "--variables") {
            None => None,
            Some(idx) => {
                let values: Vec<String> = args[idx + 1..]
                    .iter()
                    .take_while(|a| !a.starts_with("--"))
                    .cloned()
                    .collect();
                if values.is_empty() {
                    bail!("--variables requires at least one value");
                }
                Some(values)
            }
        };

        Ok(Self {
            company: value_of(args, "--company")?.map(str::to_string),
            timeframe,
            variables,
            period,
            category,
            ratio_timeframe,
            query: value_of(args, "--query")?.map(str::to_string),
            help,
        })
    }

    pub fn apply(&self, filters: &mut FilterSelection) {
        if let Some(company) = &self.company {
            filters.company = company.clone();
        }
        if let Some(timeframe) = self.timeframe {
            filters.timeframe = timeframe;
        }
        if let Some(variables) = &self.variables {
            filters.set_variables(variables);
        }
        if let Some(period) = self.period {
            filters.analysis_period = period.token();
        }
        if let Some(category) = self.category {
            filters.ratio_category = category;
        }
        if let Some(timeframe) = self.ratio_timeframe {
            filters.ratio_timeframe = timeframe;
        }
        if let Some(query) = &self.query {
            filters.query = query.clone();
        }
    }
}
