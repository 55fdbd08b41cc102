//! Batch coordinator
//!
//! Subscribes to the triggers topic and collapses every trigger already
//! queued into one batch. Each batch runs exactly one pass over the catalog
//! and publishes at most one `StatisticBatch`.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::catalog::MetricCatalog;
use super::executor::{PassReport, QueryExecutor};
use super::types::{StatisticBatch, TriggerEvent};
use super::unit::QueryableUnit;
use crate::data::provider::MetricsProvider;
use crate::data::topics::{Publisher, Subscriber, Topic, TopicError};

pub struct BatchCoordinator<U: QueryableUnit> {
    catalog: Arc<MetricCatalog<U>>,
    executor: QueryExecutor,
    provider: Arc<dyn MetricsProvider>,
    output: Publisher<StatisticBatch>,
}

impl<U: QueryableUnit> BatchCoordinator<U> {
    pub fn new(
        catalog: Arc<MetricCatalog<U>>,
        executor: QueryExecutor,
        provider: Arc<dyn MetricsProvider>,
        output: Publisher<StatisticBatch>,
    ) -> Self {
        Self {
            catalog,
            executor,
            provider,
            output,
        }
    }

    /// Run one pass for a batch of triggers
    ///
    /// Returns `None` for an empty batch (no pass is run).
    pub async fn on_batch(&self, events: &[TriggerEvent]) -> Option<PassReport> {
        if events.is_empty() {
            tracing::debug!("Empty trigger batch, skipping pass");
            return None;
        }

        let (produced, report) = {
            let units = self.catalog.lock().await;
            tracing::debug!(
                triggers = events.len(),
                units = units.len(),
                "Processing trigger batch"
            );
            self.executor
                .execute_with_report(units.as_slice(), self.provider.as_ref())
                .await
        };

        tracing::debug!(
            units = report.units,
            emitted = report.emitted,
            empty = report.empty,
            failed = report.failed,
            "Pass complete"
        );

        if !produced.is_empty() {
            let batch = StatisticBatch {
                produced_at: Utc::now(),
                events: produced,
            };
            if let Err(e) = self.output.publish(batch) {
                tracing::warn!(error = %e, "Failed to publish statistic batch");
            }
        }

        Some(report)
    }

    /// Consume the triggers topic until shutdown or the channel closes
    pub fn start(
        self,
        topic: Topic<TriggerEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut subscriber = topic.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("BatchCoordinator received shutdown");
                            break;
                        }
                    }
                    result = subscriber.recv() => {
                        let first = match result {
                            Ok(event) => event,
                            Err(TopicError::Lagged(n)) => {
                                tracing::warn!(lagged = n, "BatchCoordinator lagged");
                                TriggerEvent::now()
                            }
                            Err(_) => break,
                        };
                        let batch = drain_queued(first, &mut subscriber);
                        self.on_batch(&batch).await;
                    }
                }
            }
            tracing::debug!("BatchCoordinator shutdown complete");
        })
    }
}

/// Collect `first` plus every trigger already queued behind it
fn drain_queued(
    first: TriggerEvent,
    subscriber: &mut Subscriber<TriggerEvent>,
) -> Vec<TriggerEvent> {
    let mut batch = vec![first];
    loop {
        match subscriber.try_recv() {
            Ok(Some(event)) => batch.push(event),
            Ok(None) => break,
            Err(TopicError::Lagged(n)) => {
                tracing::warn!(lagged = n, "Trigger subscriber lagged while draining");
                batch.push(TriggerEvent::now());
            }
            Err(_) => break,
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::provider::memory::{MemoryProvider, StatsResponse};
    use crate::data::topics::TopicService;
    use crate::domain::types::{
        DataPoint, EventIdentity, MetricDescriptor, PointOrder, QueryConfig, Statistic,
    };

    struct Fixture {
        provider: Arc<MemoryProvider>,
        catalog: Arc<MetricCatalog<MetricDescriptor>>,
        topics: TopicService,
        coordinator: BatchCoordinator<MetricDescriptor>,
        output: Subscriber<StatisticBatch>,
    }

    fn point(maximum: f64) -> DataPoint {
        DataPoint {
            maximum: Some(maximum),
            ..Default::default()
        }
    }

    async fn fixture(units: usize) -> Fixture {
        let provider = Arc::new(MemoryProvider::new());
        provider.push_metrics(
            (0..units)
                .map(|i| {
                    MetricDescriptor::new("MyMetricName", "AWS/EC2")
                        .with_dimension("InstanceId", format!("instance-{}", i))
                })
                .collect(),
        );
        let catalog = Arc::new(MetricCatalog::descriptors());
        catalog
            .sync(provider.as_ref(), "MyMetricName")
            .await
            .unwrap();

        let executor = QueryExecutor::new(
            QueryConfig {
                metric_name: "MyMetricName".to_string(),
                lookback_minutes: 5,
                period_minutes: 5,
                statistic: Statistic::Maximum,
                order: PointOrder::NewestFirst,
            },
            Duration::from_secs(5),
            1,
        );

        let topics = TopicService::new();
        let statistics = topics.topic::<StatisticBatch>("statistics").unwrap();
        let output = statistics.subscribe();
        let coordinator = BatchCoordinator::new(
            Arc::clone(&catalog),
            executor,
            provider.clone() as Arc<dyn MetricsProvider>,
            statistics.publisher(),
        );

        Fixture {
            provider,
            catalog,
            topics,
            coordinator,
            output,
        }
    }

    /// A pass over any unit type can be moved onto the runtime
    fn spawnable_pass<U: QueryableUnit>(
        coordinator: BatchCoordinator<U>,
    ) -> impl Future<Output = Option<PassReport>> + Send + 'static {
        async move { coordinator.on_batch(&[TriggerEvent::now()]).await }
    }

    async fn published(output: &mut Subscriber<StatisticBatch>) -> Vec<StatisticBatch> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut batches = Vec::new();
        while let Some(batch) = output.try_recv().unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[tokio::test]
    async fn test_single_trigger_runs_one_pass() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(2.0)]));

        let report = f.coordinator.on_batch(&[TriggerEvent::now()]).await;

        assert_eq!(report.map(|r| r.emitted), Some(1));
        assert_eq!(f.provider.stats_calls().len(), 1);
        let batches = published(&mut f.output).await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].events[0].value, 2.0);
    }

    #[tokio::test]
    async fn test_many_triggers_run_one_pass() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(2.0)]));
        let events: Vec<_> = (0..5).map(|_| TriggerEvent::now()).collect();

        f.coordinator.on_batch(&events).await;

        assert_eq!(f.provider.stats_calls().len(), 1);
        assert_eq!(published(&mut f.output).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let mut f = fixture(1).await;

        assert!(f.coordinator.on_batch(&[]).await.is_none());
        assert!(f.provider.stats_calls().is_empty());
        assert!(published(&mut f.output).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pass_publishes_nothing() {
        let mut f = fixture(2).await;
        f.provider.push_stats(StatsResponse::Points(vec![]));
        f.provider.push_stats(StatsResponse::Fail("boom".to_string()));

        let report = f.coordinator.on_batch(&[TriggerEvent::now()]).await;

        assert_eq!(report.map(|r| (r.empty, r.failed)), Some((1, 1)));
        assert!(published(&mut f.output).await.is_empty());
    }

    #[tokio::test]
    async fn test_pass_events_published_together() {
        let mut f = fixture(3).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(1.0)]));
        f.provider.push_stats(StatsResponse::Points(vec![]));
        f.provider.push_stats(StatsResponse::Points(vec![point(3.0)]));

        f.coordinator.on_batch(&[TriggerEvent::now()]).await;

        let batches = published(&mut f.output).await;
        assert_eq!(batches.len(), 1);
        let values: Vec<f64> = batches[0].events.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);
    }

    #[tokio::test]
    async fn test_queued_triggers_coalesce_into_one_pass() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(2.0)]));
        let triggers = f.topics.topic::<TriggerEvent>("triggers").unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = f.coordinator.start(triggers.clone(), shutdown_rx);
        for _ in 0..5 {
            triggers.publish(TriggerEvent::now()).unwrap();
        }

        let batches = published(&mut f.output).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(f.provider.stats_calls().len(), 1);
        assert_eq!(batches.len(), 1);
    }

    #[tokio::test]
    async fn test_separate_triggers_run_separate_passes() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(2.0)]));
        f.provider.push_stats(StatsResponse::Points(vec![point(4.0)]));
        let triggers = f.topics.topic::<TriggerEvent>("triggers").unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = f.coordinator.start(triggers.clone(), shutdown_rx);
        triggers.publish(TriggerEvent::now()).unwrap();
        let first = published(&mut f.output).await;
        triggers.publish(TriggerEvent::now()).unwrap();
        let second = published(&mut f.output).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(f.provider.stats_calls().len(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].events[0].value, 4.0);
    }

    #[tokio::test]
    async fn test_stops_when_trigger_channel_closes() {
        let f = fixture(0).await;
        let triggers = f.topics.topic::<TriggerEvent>("triggers").unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = f.coordinator.start(triggers, shutdown_rx);
        drop(f.topics);

        // Dropping the service drops the last sender
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_pass_runs_on_spawned_task() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Points(vec![point(2.0)]));

        let report = tokio::spawn(spawnable_pass(f.coordinator))
            .await
            .unwrap();

        assert_eq!(report.map(|r| r.emitted), Some(1));
        assert_eq!(published(&mut f.output).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_holds_catalog_until_complete() {
        let mut f = fixture(1).await;
        f.provider.push_stats(StatsResponse::Delay(Duration::from_secs(2), vec![point(2.0)]));
        f.provider.push_metrics(vec![
            MetricDescriptor::new("MyMetricName", "AWS/EC2")
                .with_dimension("InstanceId", "instance-new"),
        ]);

        let pass = tokio::spawn(spawnable_pass(f.coordinator));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let sync = {
            let catalog = Arc::clone(&f.catalog);
            let provider = Arc::clone(&f.provider);
            tokio::spawn(async move { catalog.sync(provider.as_ref(), "MyMetricName").await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.provider.list_calls().len(), 1);
        assert!(!sync.is_finished());

        let report = pass.await.unwrap();
        assert_eq!(report.map(|r| r.emitted), Some(1));

        sync.await.unwrap().unwrap();
        assert_eq!(f.provider.list_calls().len(), 2);

        let batches = published(&mut f.output).await;
        assert_eq!(batches.len(), 1);
        let old_unit = MetricDescriptor::new("MyMetricName", "AWS/EC2")
            .with_dimension("InstanceId", "instance-0");
        assert_eq!(
            batches[0].events[0].identity,
            EventIdentity::Dimensions(old_unit.dimensions)
        );
    }
}
