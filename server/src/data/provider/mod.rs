//! Metrics provider seam
//!
//! The catalog and executor only see `MetricsProvider`. The CloudWatch adapter
//! is the production implementation; tests use the recording double in `memory`.

mod cloudwatch;
mod error;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

pub use cloudwatch::{CloudWatchProvider, normalize_region};
pub use error::{ConnectionError, DiscoveryError, QueryError};

use crate::domain::types::{DataPoint, MetricDescriptor, StatisticsQuery};

#[async_trait]
pub trait MetricsProvider: Send + Sync + std::fmt::Debug {
    /// List every series published under the given metric name
    async fn list_metrics(&self, metric_name: &str)
    -> Result<Vec<MetricDescriptor>, DiscoveryError>;

    /// Fetch data points for one series. An empty result is not an error.
    async fn get_statistics(&self, query: &StatisticsQuery) -> Result<Vec<DataPoint>, QueryError>;

    /// Human-readable provider name
    fn name(&self) -> &'static str;
}
