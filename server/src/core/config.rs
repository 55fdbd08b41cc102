use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_AWS_REGION, DEFAULT_INSTANCE_NAMESPACE,
    DEFAULT_LOOKBACK_MINUTES, DEFAULT_METRIC_NAME, DEFAULT_PERIOD_MINUTES,
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_QUERY_CONCURRENCY, DEFAULT_QUERY_TIMEOUT_SECS,
    DEFAULT_RESYNC_MINUTES, ENV_AWS_ACCESS_KEY, ENV_AWS_SECRET_KEY, MAX_QUERY_CONCURRENCY,
};
use crate::domain::types::{PointOrder, QueryConfig, Statistic};

// =============================================================================
// Catalog Mode Enum
// =============================================================================

/// What the catalog holds per discovered series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// One unit per discovered series; events carry its dimensions
    #[default]
    Descriptor,
    /// One unit per distinct instance id; events carry the id
    Instance,
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Descriptor => write!(f, "descriptor"),
            CatalogMode::Instance => write!(f, "instance"),
        }
    }
}

// =============================================================================
// Output Format Enum
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per event on stdout
    #[default]
    Json,
    /// One info log line per event
    Log,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Log => write!(f, "log"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// AWS connection section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AwsFileConfig {
    pub region: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub endpoint: Option<String>,
}

/// Metric section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MetricFileConfig {
    pub name: Option<String>,
    pub statistic: Option<Statistic>,
    pub lookback_minutes: Option<u32>,
    pub period_minutes: Option<u32>,
    pub order: Option<PointOrder>,
    pub mode: Option<CatalogMode>,
    pub namespace: Option<String>,
    pub resync_minutes: Option<u64>,
}

/// Poll section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PollFileConfig {
    pub interval_secs: Option<u64>,
    pub query_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

/// Output section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OutputFileConfig {
    pub format: Option<OutputFormat>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub aws: Option<AwsFileConfig>,
    pub metric: Option<MetricFileConfig>,
    pub poll: Option<PollFileConfig>,
    pub output: Option<OutputFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `$current.$field` with `$other.$field` when set
macro_rules! merge_fields {
    ($section:literal, $current:expr, $other:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if $other.$field.is_some() {
                tracing::trace!(
                    value = ?$other.$field,
                    "Merging {}.{}",
                    $section,
                    stringify!($field)
                );
                $current.$field = $other.$field;
            }
        )+
    };
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(aws) = other.aws {
            let current = self.aws.get_or_insert_with(AwsFileConfig::default);
            merge_fields!("aws", current, aws, [region, access_key, secret_key, endpoint]);
        }

        if let Some(metric) = other.metric {
            let current = self.metric.get_or_insert_with(MetricFileConfig::default);
            merge_fields!(
                "metric",
                current,
                metric,
                [
                    name,
                    statistic,
                    lookback_minutes,
                    period_minutes,
                    order,
                    mode,
                    namespace,
                    resync_minutes,
                ]
            );
        }

        if let Some(poll) = other.poll {
            let current = self.poll.get_or_insert_with(PollFileConfig::default);
            merge_fields!(
                "poll",
                current,
                poll,
                [interval_secs, query_timeout_secs, concurrency]
            );
        }

        if let Some(output) = other.output {
            let current = self.output.get_or_insert_with(OutputFileConfig::default);
            merge_fields!("output", current, output, [format]);
        }
    }
}

// =============================================================================
// Final Config Structs
// =============================================================================

/// AWS connection settings
#[derive(Clone, Default)]
pub struct AwsConfig {
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Custom endpoint for CloudWatch-compatible local stacks
    pub endpoint: Option<String>,
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MetricConfig {
    pub name: String,
    pub statistic: Statistic,
    pub lookback_minutes: u32,
    pub period_minutes: u32,
    pub order: PointOrder,
    pub mode: CatalogMode,
    /// Namespace queried in instance mode
    pub namespace: String,
    /// 0 = discover at startup only
    pub resync_minutes: u64,
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub query_timeout_secs: u64,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub aws: AwsConfig,
    pub metric: MetricConfig,
    pub poll: PollConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.statwatch/statwatch.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_home(path);
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(cli, file_config);
        config.validate()?;

        tracing::debug!(
            region = %config.aws.region,
            static_credentials = config.aws.access_key.is_some(),
            endpoint = ?config.aws.endpoint,
            metric = %config.metric.name,
            statistic = %config.metric.statistic,
            lookback_minutes = config.metric.lookback_minutes,
            period_minutes = config.metric.period_minutes,
            order = %config.metric.order,
            mode = %config.metric.mode,
            namespace = %config.metric.namespace,
            resync_minutes = config.metric.resync_minutes,
            interval_secs = config.poll.interval_secs,
            query_timeout_secs = config.poll.query_timeout_secs,
            concurrency = config.poll.concurrency,
            output = %config.output.format,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn layer(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_aws = file_config.aws.unwrap_or_default();
        let file_metric = file_config.metric.unwrap_or_default();
        let file_poll = file_config.poll.unwrap_or_default();
        let file_output = file_config.output.unwrap_or_default();

        let aws = AwsConfig {
            region: cli
                .region
                .clone()
                .or(file_aws.region)
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            access_key: cli.access_key.clone().or(file_aws.access_key),
            secret_key: cli.secret_key.clone().or(file_aws.secret_key),
            endpoint: cli.endpoint.clone().or(file_aws.endpoint),
        };

        let metric = MetricConfig {
            name: cli
                .metric
                .clone()
                .or(file_metric.name)
                .unwrap_or_else(|| DEFAULT_METRIC_NAME.to_string()),
            statistic: cli.statistic.or(file_metric.statistic).unwrap_or_default(),
            lookback_minutes: cli
                .lookback_minutes
                .or(file_metric.lookback_minutes)
                .unwrap_or(DEFAULT_LOOKBACK_MINUTES),
            period_minutes: cli
                .period_minutes
                .or(file_metric.period_minutes)
                .unwrap_or(DEFAULT_PERIOD_MINUTES),
            order: cli.order.or(file_metric.order).unwrap_or_default(),
            mode: cli.mode.or(file_metric.mode).unwrap_or_default(),
            namespace: cli
                .namespace
                .clone()
                .or(file_metric.namespace)
                .unwrap_or_else(|| DEFAULT_INSTANCE_NAMESPACE.to_string()),
            resync_minutes: cli
                .resync_minutes
                .or(file_metric.resync_minutes)
                .unwrap_or(DEFAULT_RESYNC_MINUTES),
        };

        let poll = PollConfig {
            interval_secs: cli
                .interval_secs
                .or(file_poll.interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            query_timeout_secs: cli
                .query_timeout_secs
                .or(file_poll.query_timeout_secs)
                .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
            concurrency: cli
                .concurrency
                .or(file_poll.concurrency)
                .unwrap_or(DEFAULT_QUERY_CONCURRENCY),
        };

        let output = OutputConfig {
            format: cli.output.or(file_output.format).unwrap_or_default(),
        };

        Self {
            aws,
            metric,
            poll,
            output,
        }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            anyhow::bail!("Configuration error: aws.region must not be empty");
        }
        if self.aws.access_key.is_some() != self.aws.secret_key.is_some() {
            anyhow::bail!(
                "Configuration error: aws.access_key and aws.secret_key must be set together \
                 (via config file, {} and {}, or neither to use the default credential chain)",
                ENV_AWS_ACCESS_KEY,
                ENV_AWS_SECRET_KEY
            );
        }

        if self.metric.name.trim().is_empty() {
            anyhow::bail!("Configuration error: metric.name must not be empty");
        }
        if self.metric.lookback_minutes == 0 {
            anyhow::bail!("Configuration error: metric.lookback_minutes must be greater than 0");
        }
        if self.metric.period_minutes == 0 {
            anyhow::bail!("Configuration error: metric.period_minutes must be greater than 0");
        }
        if i32::try_from(u64::from(self.metric.period_minutes) * 60).is_err() {
            anyhow::bail!(
                "Configuration error: metric.period_minutes is too large ({})",
                self.metric.period_minutes
            );
        }
        if self.metric.mode == CatalogMode::Instance && self.metric.namespace.trim().is_empty() {
            anyhow::bail!(
                "Configuration error: metric.namespace is required when metric.mode is 'instance'"
            );
        }
        if self.metric.lookback_minutes < self.metric.period_minutes {
            tracing::warn!(
                lookback_minutes = self.metric.lookback_minutes,
                period_minutes = self.metric.period_minutes,
                "Lookback window is shorter than the result period, queries may return no data"
            );
        }

        if self.poll.interval_secs == 0 {
            anyhow::bail!("Configuration error: poll.interval_secs must be greater than 0");
        }
        if self.poll.query_timeout_secs == 0 {
            anyhow::bail!("Configuration error: poll.query_timeout_secs must be greater than 0");
        }
        if self.poll.concurrency == 0 || self.poll.concurrency > MAX_QUERY_CONCURRENCY {
            anyhow::bail!(
                "Configuration error: poll.concurrency must be between 1 and {}",
                MAX_QUERY_CONCURRENCY
            );
        }

        Ok(())
    }

    /// Per-pass query parameters
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig {
            metric_name: self.metric.name.clone(),
            lookback_minutes: self.metric.lookback_minutes,
            period_minutes: self.metric.period_minutes,
            statistic: self.metric.statistic,
            order: self.metric.order,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.query_timeout_secs)
    }
}

/// Get the profile config path (~/.statwatch/statwatch.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
