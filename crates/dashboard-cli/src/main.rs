//! dashboard-cli: run the financial dashboard against the analytics backend
//! and print every widget once it settles.
//!
//! Usage:
//!   cargo run -p dashboard-cli -- --company "Apple Inc." --variables Open High Low Close
//!   cargo run -p dashboard-cli -- --company "Apple Inc." --period Q1_2024 --query "What drove revenue?"

use anyhow::Result;
use dashboard_core::FilterSelection;
use fetch_orchestrator::{Dashboard, FilterStore};
use task_client::DashboardConfig;

mod args;
mod render;

use args::{CliArgs, USAGE};

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "dashboard_cli=info,fetch_orchestrator=info,task_client=warn".into()
        })
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = CliArgs::parse(&argv)?;
    if cli.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = DashboardConfig::from_env()?;
    tracing::info!(
        "Polling every {:?}, up to {} attempts",
        config.poll.interval,
        config.poll.max_attempts
    );

    let mut filters = FilterSelection::default();
    cli.apply(&mut filters);
    tracing::info!(
        "Loading dashboard for {} ({}, period {})",
        filters.company,
        filters.timeframe,
        filters.analysis_period
    );

    let dashboard = Dashboard::from_config(&config, FilterStore::new(filters))?;
    let watchers = dashboard.start();

    let (_, asked) = tokio::join!(dashboard.settle(), dashboard.assistant.ask());

    println!("{}", render::charts(&dashboard.charts.state()));
    println!("{}", render::table("Ratios", &dashboard.ratios.state()));
    println!("{}", render::table("Performance", &dashboard.performance.state()));
    println!("{}", render::risk(&dashboard.risk.state()));
    if asked.is_some() {
        println!("{}", render::answer(&dashboard.assistant.state()));
    }

    for watcher in watchers {
        watcher.abort();
    }
    Ok(())
}
