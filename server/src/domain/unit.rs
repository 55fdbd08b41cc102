//! Queryable units
//!
//! A unit is one series the executor queries per pass. Two flavours exist:
//! - `MetricDescriptor`: the raw discovered series; events carry its dimensions
//! - `ResourceInstance`: a resource id pulled out of discovered dimensions,
//!   queried under a fixed namespace; events carry the id

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use super::types::{
    Dimensions, EventIdentity, MetricDescriptor, OutputEvent, QueryConfig, StatisticsQuery,
};

/// Query time window `[end - lookback, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ending_at(end: DateTime<Utc>, lookback_minutes: u32) -> Self {
        Self {
            start: end - Duration::minutes(i64::from(lookback_minutes)),
            end,
        }
    }
}

/// Something the executor can turn into a provider query and an output event
pub trait QueryableUnit: Clone + Send + Sync + fmt::Debug + fmt::Display + 'static {
    /// Build the statistics query for this unit
    fn query(&self, config: &QueryConfig, window: TimeWindow) -> StatisticsQuery;

    /// Identifying payload for output events
    fn identity(&self) -> EventIdentity;

    fn event(&self, value: f64) -> OutputEvent {
        OutputEvent {
            identity: self.identity(),
            value,
        }
    }
}

impl QueryableUnit for MetricDescriptor {
    fn query(&self, config: &QueryConfig, window: TimeWindow) -> StatisticsQuery {
        StatisticsQuery {
            period_secs: config.period_secs(),
            start: window.start,
            end: window.end,
            metric_name: self.name.clone(),
            namespace: self.namespace.clone(),
            statistic: config.statistic,
            dimensions: self.dimensions.clone(),
        }
    }

    fn identity(&self) -> EventIdentity {
        EventIdentity::Dimensions(self.dimensions.clone())
    }
}

/// A single monitored resource (e.g. an EC2 instance)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInstance {
    pub instance_id: String,
    pub namespace: String,
    pub dimension: String,
}

impl ResourceInstance {
    /// Collect distinct resource ids from the `dimension` values of discovered series
    ///
    /// Series without that dimension are skipped; first-seen order is kept.
    pub fn from_descriptors(
        descriptors: &[MetricDescriptor],
        namespace: &str,
        dimension: &str,
    ) -> Vec<Self> {
        let mut seen = HashSet::new();
        descriptors
            .iter()
            .filter_map(|d| d.dimensions.get(dimension))
            .flatten()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| Self {
                instance_id: id.clone(),
                namespace: namespace.to_string(),
                dimension: dimension.to_string(),
            })
            .collect()
    }
}

impl fmt::Display for ResourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance_id)
    }
}

impl QueryableUnit for ResourceInstance {
    fn query(&self, config: &QueryConfig, window: TimeWindow) -> StatisticsQuery {
        let mut dimensions = Dimensions::new();
        dimensions.insert(self.dimension.clone(), vec![self.instance_id.clone()]);
        StatisticsQuery {
            period_secs: config.period_secs(),
            start: window.start,
            end: window.end,
            metric_name: config.metric_name.clone(),
            namespace: self.namespace.clone(),
            statistic: config.statistic,
            dimensions,
        }
    }

    fn identity(&self) -> EventIdentity {
        EventIdentity::InstanceId(self.instance_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PointOrder, Statistic};

    fn config() -> QueryConfig {
        QueryConfig {
            metric_name: "MyMetricName".to_string(),
            lookback_minutes: 60,
            period_minutes: 5,
            statistic: Statistic::Maximum,
            order: PointOrder::NewestFirst,
        }
    }

    #[test]
    fn test_time_window_lookback() {
        let end = Utc::now();
        let window = TimeWindow::ending_at(end, 60);
        assert_eq!(window.end, end);
        assert_eq!(window.end - window.start, Duration::minutes(60));
    }

    #[test]
    fn test_descriptor_query() {
        let descriptor = MetricDescriptor::new("CPUCreditBalance", "AWS/EC2")
            .with_dimension("InstanceId", "i-1");
        let window = TimeWindow::ending_at(Utc::now(), 60);
        let query = descriptor.query(&config(), window);

        assert_eq!(query.period_secs, 300);
        assert_eq!(query.metric_name, "CPUCreditBalance");
        assert_eq!(query.namespace, "AWS/EC2");
        assert_eq!(query.statistic, Statistic::Maximum);
        assert_eq!(query.dimensions, descriptor.dimensions);
        assert_eq!(query.start, window.start);
        assert_eq!(query.end, window.end);
    }

    #[test]
    fn test_instance_query_uses_configured_metric_and_namespace() {
        let instance = ResourceInstance {
            instance_id: "instance-1".to_string(),
            namespace: "AWS/EC2".to_string(),
            dimension: "InstanceId".to_string(),
        };
        let query = instance.query(&config(), TimeWindow::ending_at(Utc::now(), 60));

        assert_eq!(query.period_secs, 300);
        assert_eq!(query.metric_name, "MyMetricName");
        assert_eq!(query.namespace, "AWS/EC2");
        assert_eq!(
            query.dimensions.get("InstanceId"),
            Some(&vec!["instance-1".to_string()])
        );
        assert_eq!(
            instance.identity(),
            EventIdentity::InstanceId("instance-1".to_string())
        );
    }

    #[test]
    fn test_instances_from_descriptors() {
        let descriptors = vec![
            MetricDescriptor::new("m", "AWS/EC2").with_dimension("InstanceId", "instance-1"),
            MetricDescriptor::new("m", "AWS/EC2").with_dimension("AutoScalingGroupName", "web"),
            MetricDescriptor::new("m", "AWS/EC2").with_dimension("InstanceId", "instance-2"),
            MetricDescriptor::new("m", "AWS/EC2").with_dimension("InstanceId", "instance-1"),
        ];
        let instances = ResourceInstance::from_descriptors(&descriptors, "AWS/EC2", "InstanceId");
        let ids: Vec<&str> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["instance-1", "instance-2"]);
    }
}
