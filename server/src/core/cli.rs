use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::{CatalogMode, OutputFormat};
use super::constants::{
    APP_NAME_LOWER, ENV_AWS_ACCESS_KEY, ENV_AWS_ENDPOINT, ENV_AWS_REGION, ENV_AWS_SECRET_KEY,
    ENV_CONFIG, ENV_METRIC_LOOKBACK_MINUTES, ENV_METRIC_MODE, ENV_METRIC_NAME,
    ENV_METRIC_NAMESPACE, ENV_METRIC_ORDER, ENV_METRIC_PERIOD_MINUTES, ENV_METRIC_RESYNC_MINUTES,
    ENV_METRIC_STATISTIC, ENV_OUTPUT_FORMAT, ENV_POLL_CONCURRENCY, ENV_POLL_INTERVAL_SECS,
    ENV_POLL_QUERY_TIMEOUT_SECS,
};
use crate::domain::types::{PointOrder, Statistic};

#[derive(Parser)]
#[command(name = APP_NAME_LOWER)]
#[command(version, about = "CloudWatch metric statistics poller", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    // AWS options
    /// AWS region (us-east-1 or us_east_1)
    #[arg(long, global = true, env = ENV_AWS_REGION)]
    pub region: Option<String>,

    /// AWS access key id (defaults to the SDK credential chain)
    #[arg(long, global = true, env = ENV_AWS_ACCESS_KEY)]
    pub access_key: Option<String>,

    /// AWS secret access key
    #[arg(long, global = true, env = ENV_AWS_SECRET_KEY, hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Custom CloudWatch endpoint URL
    #[arg(long, global = true, env = ENV_AWS_ENDPOINT)]
    pub endpoint: Option<String>,

    // Metric options
    /// Metric name to discover and poll
    #[arg(long, short = 'm', global = true, env = ENV_METRIC_NAME)]
    pub metric: Option<String>,

    /// Statistic to extract (Average, Sum, SampleCount, Maximum, Minimum)
    #[arg(long, short = 's', global = true, env = ENV_METRIC_STATISTIC, value_parser = parse_statistic)]
    pub statistic: Option<Statistic>,

    /// Lookback window in minutes
    #[arg(long, global = true, env = ENV_METRIC_LOOKBACK_MINUTES)]
    pub lookback_minutes: Option<u32>,

    /// Result period in minutes
    #[arg(long, global = true, env = ENV_METRIC_PERIOD_MINUTES)]
    pub period_minutes: Option<u32>,

    /// Position of the newest data point in results (newest_first or newest_last)
    #[arg(long, global = true, env = ENV_METRIC_ORDER, value_parser = parse_point_order)]
    pub order: Option<PointOrder>,

    /// Catalog mode (descriptor or instance)
    #[arg(long, global = true, env = ENV_METRIC_MODE, value_parser = parse_catalog_mode)]
    pub mode: Option<CatalogMode>,

    /// Namespace queried in instance mode
    #[arg(long, global = true, env = ENV_METRIC_NAMESPACE)]
    pub namespace: Option<String>,

    /// Catalog re-sync interval in minutes (0 = startup only)
    #[arg(long, global = true, env = ENV_METRIC_RESYNC_MINUTES)]
    pub resync_minutes: Option<u64>,

    // Poll options
    /// Trigger interval in seconds
    #[arg(long, short = 'i', global = true, env = ENV_POLL_INTERVAL_SECS)]
    pub interval_secs: Option<u64>,

    /// Timeout for a single statistics query in seconds
    #[arg(long, global = true, env = ENV_POLL_QUERY_TIMEOUT_SECS)]
    pub query_timeout_secs: Option<u64>,

    /// Concurrent statistics queries within one pass
    #[arg(long, global = true, env = ENV_POLL_CONCURRENCY)]
    pub concurrency: Option<usize>,

    /// Output format (json or log)
    #[arg(long, global = true, env = ENV_OUTPUT_FORMAT, value_parser = parse_output_format)]
    pub output: Option<OutputFormat>,
}

/// Parse statistic from CLI/env string
fn parse_statistic(s: &str) -> Result<Statistic, String> {
    s.parse()
}

/// Parse point order from CLI/env string
fn parse_point_order(s: &str) -> Result<PointOrder, String> {
    match s.to_lowercase().replace('-', "_").as_str() {
        "newest_first" | "first" => Ok(PointOrder::NewestFirst),
        "newest_last" | "last" => Ok(PointOrder::NewestLast),
        _ => Err(format!(
            "Invalid point order '{}'. Valid options: newest_first, newest_last",
            s
        )),
    }
}

/// Parse catalog mode from CLI/env string
fn parse_catalog_mode(s: &str) -> Result<CatalogMode, String> {
    match s.to_lowercase().as_str() {
        "descriptor" | "descriptors" => Ok(CatalogMode::Descriptor),
        "instance" | "instances" => Ok(CatalogMode::Instance),
        _ => Err(format!(
            "Invalid catalog mode '{}'. Valid options: descriptor, instance",
            s
        )),
    }
}

/// Parse output format from CLI/env string
fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    match s.to_lowercase().as_str() {
        "json" => Ok(OutputFormat::Json),
        "log" => Ok(OutputFormat::Log),
        _ => Err(format!(
            "Invalid output format '{}'. Valid options: json, log",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start polling (default command)
    Start,
    /// Discover the catalog once, print it and exit
    Discover,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub config: Option<PathBuf>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
    pub metric: Option<String>,
    pub statistic: Option<Statistic>,
    pub lookback_minutes: Option<u32>,
    pub period_minutes: Option<u32>,
    pub order: Option<PointOrder>,
    pub mode: Option<CatalogMode>,
    pub namespace: Option<String>,
    pub resync_minutes: Option<u64>,
    pub interval_secs: Option<u64>,
    pub query_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub output: Option<OutputFormat>,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            region: cli.region,
            access_key: cli.access_key,
            secret_key: cli.secret_key,
            endpoint: cli.endpoint,
            metric: cli.metric,
            statistic: cli.statistic,
            lookback_minutes: cli.lookback_minutes,
            period_minutes: cli.period_minutes,
            order: cli.order,
            mode: cli.mode,
            namespace: cli.namespace,
            resync_minutes: cli.resync_minutes,
            interval_secs: cli.interval_secs,
            query_timeout_secs: cli.query_timeout_secs,
            concurrency: cli.concurrency,
            output: cli.output,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (CliConfig::from(cli), command)
}
