//! Metrics provider error types

use thiserror::Error;

/// Discovery (list metrics) failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Metric discovery failed for '{metric_name}': {message}")]
pub struct DiscoveryError {
    pub metric_name: String,
    pub message: String,
}

impl DiscoveryError {
    pub fn new(metric_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            message: message.into(),
        }
    }
}

/// A single statistics query failed (isolated per unit)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Statistics query failed for {unit}: {message}")]
    Provider { unit: String, message: String },

    #[error("Statistics query for {unit} timed out after {secs}s")]
    Timeout { unit: String, secs: u64 },

    #[error("Data point for {unit} has no {statistic} value")]
    MissingStatistic { unit: String, statistic: String },
}

impl QueryError {
    pub fn provider(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Provider could not be reached or the catalog could not be populated at startup
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid provider credentials: {0}")]
    Credentials(String),

    #[error("Unable to populate metric catalog: {0}")]
    Discovery(#[from] DiscoveryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_display() {
        let err = DiscoveryError::new("CPUCreditBalance", "access denied");
        assert_eq!(
            err.to_string(),
            "Metric discovery failed for 'CPUCreditBalance': access denied"
        );
    }

    #[test]
    fn test_query_error_display() {
        let err = QueryError::Timeout {
            unit: "i-1".to_string(),
            secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "Statistics query for i-1 timed out after 30s"
        );

        let err = QueryError::provider("i-2", "throttled");
        assert_eq!(err.to_string(), "Statistics query failed for i-2: throttled");
    }

    #[test]
    fn test_connection_error_from_discovery() {
        let err: ConnectionError = DiscoveryError::new("m", "boom").into();
        assert!(matches!(err, ConnectionError::Discovery(_)));
        assert!(err.to_string().contains("boom"));
    }
}
