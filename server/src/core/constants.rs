// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "StatWatch";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "statwatch";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".statwatch";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "statwatch.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "STATWATCH_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "STATWATCH_LOG";

// =============================================================================
// Environment Variables - AWS
// =============================================================================

/// Environment variable for the AWS region (underscores are accepted: us_east_1)
pub const ENV_AWS_REGION: &str = "STATWATCH_AWS_REGION";

/// Environment variable for the AWS access key id
pub const ENV_AWS_ACCESS_KEY: &str = "STATWATCH_AWS_ACCESS_KEY";

/// Environment variable for the AWS secret access key
pub const ENV_AWS_SECRET_KEY: &str = "STATWATCH_AWS_SECRET_KEY";

/// Environment variable for a custom CloudWatch endpoint (local stacks)
pub const ENV_AWS_ENDPOINT: &str = "STATWATCH_AWS_ENDPOINT";

/// Default AWS region
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Static credentials provider name reported to the AWS SDK
pub const AWS_STATIC_CREDENTIALS_PROVIDER: &str = "statwatch-config";

// =============================================================================
// Environment Variables - Metric
// =============================================================================

pub const ENV_METRIC_NAME: &str = "STATWATCH_METRIC_NAME";
pub const ENV_METRIC_STATISTIC: &str = "STATWATCH_METRIC_STATISTIC";
pub const ENV_METRIC_LOOKBACK_MINUTES: &str = "STATWATCH_METRIC_LOOKBACK_MINUTES";
pub const ENV_METRIC_PERIOD_MINUTES: &str = "STATWATCH_METRIC_PERIOD_MINUTES";
pub const ENV_METRIC_ORDER: &str = "STATWATCH_METRIC_ORDER";
pub const ENV_METRIC_MODE: &str = "STATWATCH_METRIC_MODE";
pub const ENV_METRIC_NAMESPACE: &str = "STATWATCH_METRIC_NAMESPACE";
pub const ENV_METRIC_RESYNC_MINUTES: &str = "STATWATCH_METRIC_RESYNC_MINUTES";

// =============================================================================
// Metric Defaults
// =============================================================================

/// Default metric to monitor
pub const DEFAULT_METRIC_NAME: &str = "CPUCreditBalance";

/// Default lookback window in minutes
pub const DEFAULT_LOOKBACK_MINUTES: u32 = 5;

/// Default result period in minutes
pub const DEFAULT_PERIOD_MINUTES: u32 = 5;

/// Namespace queried in instance mode
pub const DEFAULT_INSTANCE_NAMESPACE: &str = "AWS/EC2";

/// Dimension that carries the resource identifier in instance mode
pub const INSTANCE_ID_DIMENSION: &str = "InstanceId";

/// Catalog re-sync interval in minutes (0 = only at startup)
pub const DEFAULT_RESYNC_MINUTES: u64 = 0;

// =============================================================================
// Environment Variables - Polling
// =============================================================================

pub const ENV_POLL_INTERVAL_SECS: &str = "STATWATCH_POLL_INTERVAL_SECS";
pub const ENV_POLL_QUERY_TIMEOUT_SECS: &str = "STATWATCH_POLL_QUERY_TIMEOUT_SECS";
pub const ENV_POLL_CONCURRENCY: &str = "STATWATCH_POLL_CONCURRENCY";

// =============================================================================
// Polling Defaults
// =============================================================================

/// Default trigger interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default per-call timeout for statistics queries in seconds
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent statistics queries within one pass
pub const DEFAULT_QUERY_CONCURRENCY: usize = 1;

/// Upper bound for query concurrency
pub const MAX_QUERY_CONCURRENCY: usize = 64;

// =============================================================================
// Environment Variables - Output
// =============================================================================

pub const ENV_OUTPUT_FORMAT: &str = "STATWATCH_OUTPUT_FORMAT";

// =============================================================================
// Topic Names
// =============================================================================

/// Topic name for inbound trigger events
pub const TOPIC_TRIGGERS: &str = "triggers";

/// Topic name for outbound statistic batches
pub const TOPIC_STATISTICS: &str = "statistics";

// =============================================================================
// Topic Configuration
// =============================================================================

/// Environment variable for topic buffer size in bytes
pub const ENV_TOPIC_BUFFER_SIZE: &str = "STATWATCH_TOPIC_BUFFER_SIZE";

/// Environment variable for topic channel capacity
pub const ENV_TOPIC_CHANNEL_CAPACITY: &str = "STATWATCH_TOPIC_CHANNEL_CAPACITY";

/// Default topic buffer size (16 MB)
pub const DEFAULT_TOPIC_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Default topic channel capacity (messages)
pub const DEFAULT_TOPIC_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 60;
