//! Startup banner
//!
//! Written to stderr; stdout carries JSON output lines.

use super::config::{AppConfig, CatalogMode};
use super::constants::APP_NAME;

/// Print the startup banner with the effective polling setup
pub fn print_banner(config: &AppConfig, provider: &str, units: usize) {
    // Label width: "Statistic:" padded for alignment
    const W: usize = 12;

    eprintln!();
    eprintln!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();

    let target = match config.metric.mode {
        CatalogMode::Descriptor => config.metric.name.clone(),
        CatalogMode::Instance => format!("{} ({})", config.metric.name, config.metric.namespace),
    };
    eprintln!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Metric:", target
    );
    eprintln!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} over {}m, period {}m",
        "Statistic:",
        config.metric.statistic,
        config.metric.lookback_minutes,
        config.metric.period_minutes
    );
    eprintln!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} {} in {} mode",
        "Catalog:", units, provider, config.metric.mode
    );
    eprintln!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m every {}s",
        "Poll:", config.poll.interval_secs
    );
    if let Some(endpoint) = &config.aws.endpoint {
        eprintln!(
            "  \x1b[90m➜  {:<W$} {} ({})\x1b[0m",
            "Endpoint:", endpoint, config.aws.region
        );
    } else {
        eprintln!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Region:", config.aws.region);
    }

    eprintln!();
}
