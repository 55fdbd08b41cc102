//! AWS CloudWatch metrics provider

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, Metric};
use chrono::{DateTime, Utc};

use super::MetricsProvider;
use super::error::{ConnectionError, DiscoveryError, QueryError};
use crate::core::config::AwsConfig;
use crate::core::constants::AWS_STATIC_CREDENTIALS_PROVIDER;
use crate::domain::types::{DataPoint, Dimensions, MetricDescriptor, Statistic, StatisticsQuery};

/// CloudWatch-backed provider
#[derive(Debug, Clone)]
pub struct CloudWatchProvider {
    client: Client,
}

impl CloudWatchProvider {
    /// Build an authenticated client from configuration
    ///
    /// Static keys are used when both are configured; otherwise the default AWS
    /// credential chain applies (environment, profile, instance role).
    pub async fn connect(config: &AwsConfig) -> Result<Self, ConnectionError> {
        let region = normalize_region(&config.region);
        tracing::debug!(region = %region, "Connecting to CloudWatch");

        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_cloudwatch::config::Region::new(region.clone()));

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    AWS_STATIC_CREDENTIALS_PROVIDER,
                );
                config_loader = config_loader.credentials_provider(credentials);
            }
            (None, None) => {
                tracing::debug!("No static AWS keys configured, using default credential chain");
            }
            _ => {
                return Err(ConnectionError::Credentials(
                    "aws.access_key and aws.secret_key must be set together".to_string(),
                ));
            }
        }

        let sdk_config = config_loader.load().await;

        let mut cw_config = aws_sdk_cloudwatch::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &config.endpoint {
            cw_config = cw_config.endpoint_url(endpoint_url);
        }
        let client = Client::from_conf(cw_config.build());

        tracing::debug!(region = %region, "Connection complete");
        Ok(Self { client })
    }

    fn to_sdk_statistic(statistic: Statistic) -> aws_sdk_cloudwatch::types::Statistic {
        use aws_sdk_cloudwatch::types::Statistic as Sdk;
        match statistic {
            Statistic::Average => Sdk::Average,
            Statistic::Sum => Sdk::Sum,
            Statistic::SampleCount => Sdk::SampleCount,
            Statistic::Maximum => Sdk::Maximum,
            Statistic::Minimum => Sdk::Minimum,
        }
    }

    fn to_sdk_time(time: DateTime<Utc>) -> AwsDateTime {
        AwsDateTime::from_secs(time.timestamp())
    }

    fn to_sdk_dimensions(dimensions: &Dimensions) -> Vec<Dimension> {
        dimensions
            .iter()
            .flat_map(|(name, values)| {
                values
                    .iter()
                    .map(move |value| Dimension::builder().name(name).value(value).build())
            })
            .collect()
    }

    fn from_sdk_metric(metric: &Metric) -> Option<MetricDescriptor> {
        let name = metric.metric_name()?;
        let namespace = metric.namespace()?;
        let mut descriptor = MetricDescriptor::new(name, namespace);
        for dimension in metric.dimensions() {
            if let (Some(key), Some(value)) = (dimension.name(), dimension.value()) {
                descriptor = descriptor.with_dimension(key, value);
            }
        }
        Some(descriptor)
    }

    fn from_sdk_datapoint(point: &Datapoint) -> DataPoint {
        DataPoint {
            timestamp: point
                .timestamp()
                .and_then(|ts| DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())),
            average: point.average(),
            sum: point.sum(),
            sample_count: point.sample_count(),
            maximum: point.maximum(),
            minimum: point.minimum(),
        }
    }
}

/// Sort points newest-first; points without a timestamp go last
pub(crate) fn sort_newest_first(points: &mut [DataPoint]) {
    points.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Accept region names written with underscores (`us_east_1` -> `us-east-1`)
pub fn normalize_region(region: &str) -> String {
    region.trim().replace('_', "-").to_lowercase()
}

#[async_trait]
impl MetricsProvider for CloudWatchProvider {
    async fn list_metrics(
        &self,
        metric_name: &str,
    ) -> Result<Vec<MetricDescriptor>, DiscoveryError> {
        let mut descriptors = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_metrics()
                .metric_name(metric_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| {
                    DiscoveryError::new(
                        metric_name,
                        aws_sdk_cloudwatch::error::DisplayErrorContext(e).to_string(),
                    )
                })?;

            descriptors.extend(output.metrics().iter().filter_map(Self::from_sdk_metric));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::trace!(metric_name, count = descriptors.len(), "Listed metrics");
        Ok(descriptors)
    }

    async fn get_statistics(&self, query: &StatisticsQuery) -> Result<Vec<DataPoint>, QueryError> {
        let output = self
            .client
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .set_dimensions(Some(Self::to_sdk_dimensions(&query.dimensions)))
            .start_time(Self::to_sdk_time(query.start))
            .end_time(Self::to_sdk_time(query.end))
            .period(query.period_secs)
            .statistics(Self::to_sdk_statistic(query.statistic))
            .send()
            .await
            .map_err(|e| {
                QueryError::provider(
                    format!("{}/{}", query.namespace, query.metric_name),
                    aws_sdk_cloudwatch::error::DisplayErrorContext(e).to_string(),
                )
            })?;

        // CloudWatch does not guarantee datapoint order
        let mut points: Vec<DataPoint> = output
            .datapoints()
            .iter()
            .map(Self::from_sdk_datapoint)
            .collect();
        sort_newest_first(&mut points);
        Ok(points)
    }

    fn name(&self) -> &'static str {
        "cloudwatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_region() {
        assert_eq!(normalize_region("us_east_1"), "us-east-1");
        assert_eq!(normalize_region("eu-west-1"), "eu-west-1");
        assert_eq!(normalize_region(" US_WEST_2 "), "us-west-2");
    }

    #[test]
    fn test_sort_newest_first() {
        let at = |secs: i64| DateTime::from_timestamp(secs, 0);
        let mut points = vec![
            DataPoint {
                timestamp: at(100),
                maximum: Some(1.0),
                ..Default::default()
            },
            DataPoint {
                timestamp: None,
                maximum: Some(9.0),
                ..Default::default()
            },
            DataPoint {
                timestamp: at(300),
                maximum: Some(3.0),
                ..Default::default()
            },
            DataPoint {
                timestamp: at(200),
                maximum: Some(2.0),
                ..Default::default()
            },
        ];
        sort_newest_first(&mut points);
        let values: Vec<f64> = points.iter().filter_map(|p| p.maximum).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0, 9.0]);
    }

    #[test]
    fn test_to_sdk_dimensions_flattens_values() {
        let descriptor = MetricDescriptor::new("m", "ns")
            .with_dimension("InstanceId", "i-1")
            .with_dimension("InstanceId", "i-2")
            .with_dimension("AutoScalingGroupName", "web");
        let dims = CloudWatchProvider::to_sdk_dimensions(&descriptor.dimensions);
        let pairs: Vec<(Option<&str>, Option<&str>)> =
            dims.iter().map(|d| (d.name(), d.value())).collect();
        assert_eq!(
            pairs,
            vec![
                (Some("AutoScalingGroupName"), Some("web")),
                (Some("InstanceId"), Some("i-1")),
                (Some("InstanceId"), Some("i-2")),
            ]
        );
    }

    #[test]
    fn test_from_sdk_metric() {
        let metric = Metric::builder()
            .metric_name("CPUCreditBalance")
            .namespace("AWS/EC2")
            .dimensions(Dimension::builder().name("InstanceId").value("i-1").build())
            .build();
        let descriptor = CloudWatchProvider::from_sdk_metric(&metric).unwrap();
        assert_eq!(
            descriptor,
            MetricDescriptor::new("CPUCreditBalance", "AWS/EC2").with_dimension("InstanceId", "i-1")
        );
    }

    #[test]
    fn test_from_sdk_metric_requires_name() {
        let metric = Metric::builder().namespace("AWS/EC2").build();
        assert!(CloudWatchProvider::from_sdk_metric(&metric).is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_partial_credentials() {
        let config = AwsConfig {
            region: "us_east_1".to_string(),
            access_key: Some("FAKEKEY".to_string()),
            secret_key: None,
            endpoint: None,
        };
        let err = CloudWatchProvider::connect(&config).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Credentials(_)));
    }
}
