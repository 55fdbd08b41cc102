//! Scripted in-memory provider used by unit tests

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::MetricsProvider;
use super::error::{DiscoveryError, QueryError};
use crate::domain::types::{DataPoint, MetricDescriptor, StatisticsQuery};

/// Scripted response for one `get_statistics` call
#[derive(Debug, Clone)]
pub enum StatsResponse {
    Points(Vec<DataPoint>),
    Fail(String),
    /// Sleep before answering (to exercise timeouts)
    Delay(Duration, Vec<DataPoint>),
}

#[derive(Debug, Default)]
pub struct MemoryProvider {
    metrics: Mutex<VecDeque<Result<Vec<MetricDescriptor>, String>>>,
    stats: Mutex<VecDeque<StatsResponse>>,
    stats_by_unit: Mutex<HashMap<String, StatsResponse>>,
    finished_units: Mutex<Vec<String>>,
    list_calls: Mutex<Vec<String>>,
    stats_calls: Mutex<Vec<StatisticsQuery>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `list_metrics` call
    pub fn push_metrics(&self, descriptors: Vec<MetricDescriptor>) {
        self.metrics.lock().push_back(Ok(descriptors));
    }

    pub fn push_metrics_error(&self, message: &str) {
        self.metrics.lock().push_back(Err(message.to_string()));
    }

    /// Queue the result of the next `get_statistics` call
    pub fn push_stats(&self, response: StatsResponse) {
        self.stats.lock().push_back(response);
    }

    /// Script the response for the unit whose query carries `dimension_value`
    pub fn push_stats_for(&self, dimension_value: &str, response: StatsResponse) {
        self.stats_by_unit
            .lock()
            .insert(dimension_value.to_string(), response);
    }

    /// Units scripted with `push_stats_for`, in the order their queries completed
    pub fn finished_units(&self) -> Vec<String> {
        self.finished_units.lock().clone()
    }

    fn next_response(&self, query: &StatisticsQuery) -> (Option<String>, Option<StatsResponse>) {
        let mut by_unit = self.stats_by_unit.lock();
        let unit = query
            .dimensions
            .values()
            .flatten()
            .find(|value| by_unit.contains_key(*value))
            .cloned();
        match unit {
            Some(unit) => {
                let response = by_unit.remove(&unit);
                (Some(unit), response)
            }
            None => (None, self.stats.lock().pop_front()),
        }
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().clone()
    }

    pub fn stats_calls(&self) -> Vec<StatisticsQuery> {
        self.stats_calls.lock().clone()
    }
}

#[async_trait]
impl MetricsProvider for MemoryProvider {
    async fn list_metrics(
        &self,
        metric_name: &str,
    ) -> Result<Vec<MetricDescriptor>, DiscoveryError> {
        self.list_calls.lock().push(metric_name.to_string());
        let next = self.metrics.lock().pop_front();
        match next {
            Some(Ok(descriptors)) => Ok(descriptors),
            Some(Err(message)) => Err(DiscoveryError::new(metric_name, message)),
            None => Ok(Vec::new()),
        }
    }

    async fn get_statistics(&self, query: &StatisticsQuery) -> Result<Vec<DataPoint>, QueryError> {
        self.stats_calls.lock().push(query.clone());
        let (unit, next) = self.next_response(query);
        let result = match next {
            Some(StatsResponse::Points(points)) => Ok(points),
            Some(StatsResponse::Fail(message)) => {
                Err(QueryError::provider(query.metric_name.clone(), message))
            }
            Some(StatsResponse::Delay(delay, points)) => {
                tokio::time::sleep(delay).await;
                Ok(points)
            }
            None => Ok(Vec::new()),
        };
        if let Some(unit) = unit {
            self.finished_units.lock().push(unit);
        }
        result
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
