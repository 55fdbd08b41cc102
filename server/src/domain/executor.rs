//! Query executor
//!
//! One pass = one statistics query per unit. Each unit is handled in isolation:
//! a failed, timed-out or empty query only removes that unit's event from the
//! pass. Results keep snapshot order even when queries run concurrently.

use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;

use super::extract::{Extracted, extract_latest};
use super::types::{OutputEvent, QueryConfig};
use super::unit::{QueryableUnit, TimeWindow};
use crate::core::constants::MAX_QUERY_CONCURRENCY;
use crate::data::provider::{MetricsProvider, QueryError};

/// Per-pass counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub units: usize,
    pub emitted: usize,
    pub empty: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct QueryExecutor {
    config: QueryConfig,
    query_timeout: Duration,
    concurrency: usize,
}

impl QueryExecutor {
    pub fn new(config: QueryConfig, query_timeout: Duration, concurrency: usize) -> Self {
        Self {
            config,
            query_timeout,
            concurrency: concurrency.clamp(1, MAX_QUERY_CONCURRENCY),
        }
    }

    /// Query every unit and return the produced events in unit order
    pub async fn execute<U: QueryableUnit>(
        &self,
        units: &[U],
        provider: &dyn MetricsProvider,
    ) -> Vec<OutputEvent> {
        self.execute_with_report(units, provider).await.0
    }

    pub async fn execute_with_report<U: QueryableUnit>(
        &self,
        units: &[U],
        provider: &dyn MetricsProvider,
    ) -> (Vec<OutputEvent>, PassReport) {
        let window = TimeWindow::ending_at(Utc::now(), self.config.lookback_minutes);

        // Collected first: the pass future must be `Send` for every `U`
        let queries: Vec<_> = units
            .iter()
            .map(|unit| self.query_unit(unit, provider, window))
            .collect();
        let results: Vec<Result<Option<OutputEvent>, QueryError>> =
            futures::stream::iter(queries)
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut report = PassReport {
            units: units.len(),
            ..Default::default()
        };
        let mut events = Vec::with_capacity(results.len());

        for (unit, result) in units.iter().zip(results) {
            match result {
                Ok(Some(event)) => {
                    tracing::debug!(unit = %unit, value = event.value, "Metric value");
                    report.emitted += 1;
                    events.push(event);
                }
                Ok(None) => {
                    tracing::info!(unit = %unit, "Metric did not return any value");
                    report.empty += 1;
                }
                Err(e) => {
                    tracing::warn!(unit = %unit, error = %e, "Unable to get metric value");
                    report.failed += 1;
                }
            }
        }

        (events, report)
    }

    /// Query one unit; `Ok(None)` means no data points in the window
    async fn query_unit<U: QueryableUnit>(
        &self,
        unit: &U,
        provider: &dyn MetricsProvider,
        window: TimeWindow,
    ) -> Result<Option<OutputEvent>, QueryError> {
        let query = unit.query(&self.config, window);
        tracing::trace!(unit = %unit, query = ?query, "Getting value");

        let points = tokio::time::timeout(self.query_timeout, provider.get_statistics(&query))
            .await
            .map_err(|_| QueryError::Timeout {
                unit: unit.to_string(),
                secs: self.query_timeout.as_secs(),
            })??;

        match extract_latest(&points, self.config.statistic, self.config.order) {
            Extracted::Value(value) => Ok(Some(unit.event(value))),
            Extracted::Empty => Ok(None),
            Extracted::Missing => Err(QueryError::MissingStatistic {
                unit: unit.to_string(),
                statistic: self.config.statistic.to_string(),
            }),
        }
    }
}
