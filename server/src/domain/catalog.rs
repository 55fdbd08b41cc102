//! Metric catalog
//!
//! Holds the set of units discovered for the configured metric name. Every
//! access goes through one mutex: `sync` holds it for the whole discovery call,
//! and a query pass holds it (via `lock`) until the pass completes, so a refresh
//! can never swap units out from under a running pass.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::task::JoinHandle;

use super::types::MetricDescriptor;
use super::unit::{QueryableUnit, ResourceInstance};
use crate::data::provider::{DiscoveryError, MetricsProvider};

type DeriveFn<U> = Box<dyn Fn(Vec<MetricDescriptor>) -> Vec<U> + Send + Sync>;

pub struct MetricCatalog<U: QueryableUnit> {
    units: Mutex<Vec<U>>,
    derive: DeriveFn<U>,
}

impl MetricCatalog<MetricDescriptor> {
    /// One unit per discovered series
    pub fn descriptors() -> Self {
        Self::with_derive(|descriptors| descriptors)
    }
}

impl MetricCatalog<ResourceInstance> {
    /// One unit per distinct resource id found under `dimension`
    pub fn instances(namespace: impl Into<String>, dimension: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let dimension = dimension.into();
        Self::with_derive(move |descriptors| {
            ResourceInstance::from_descriptors(&descriptors, &namespace, &dimension)
        })
    }
}

impl<U: QueryableUnit> MetricCatalog<U> {
    pub fn with_derive<F>(derive: F) -> Self
    where
        F: Fn(Vec<MetricDescriptor>) -> Vec<U> + Send + Sync + 'static,
    {
        Self {
            units: Mutex::new(Vec::new()),
            derive: Box::new(derive),
        }
    }

    /// Replace the catalog with the provider's current series for `metric_name`
    ///
    /// Full replace, never merge. On error the previous contents are kept.
    pub async fn sync(
        &self,
        provider: &dyn MetricsProvider,
        metric_name: &str,
    ) -> Result<usize, DiscoveryError> {
        let mut units = self.units.lock().await;
        tracing::debug!(
            metric_name,
            provider = provider.name(),
            "Syncing valid metrics"
        );

        let descriptors = provider.list_metrics(metric_name).await?;
        let discovered = descriptors.len();
        *units = (self.derive)(descriptors);

        tracing::debug!(
            metric_name,
            discovered,
            units = units.len(),
            "Metrics loaded"
        );
        Ok(units.len())
    }

    /// Copy of the current units
    pub async fn snapshot(&self) -> Vec<U> {
        self.units.lock().await.clone()
    }

    /// Exclusive access for the duration of a query pass
    pub async fn lock(&self) -> MutexGuard<'_, Vec<U>> {
        self.units.lock().await
    }

    pub async fn len(&self) -> usize {
        self.units.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.lock().await.is_empty()
    }

    /// Periodically re-discover the catalog (`resync_minutes == 0` disables)
    ///
    /// A failed re-sync is logged and the previous units stay in place.
    pub fn start_resync_task(
        self: &Arc<Self>,
        provider: Arc<dyn MetricsProvider>,
        metric_name: String,
        resync_minutes: u64,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Option<JoinHandle<()>> {
        if resync_minutes == 0 {
            return None;
        }

        let interval = Duration::from_secs(resync_minutes.saturating_mul(60));
        let catalog = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.tick().await; // Startup sync already ran

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        match catalog.sync(provider.as_ref(), &metric_name).await {
                            Ok(units) => tracing::info!(units, "Catalog re-synced"),
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Catalog re-sync failed, keeping previous metrics"
                                );
                            }
                        }
                    }
                }
            }
            tracing::debug!("Catalog re-sync task stopped");
        }))
    }
}

impl<U: QueryableUnit> fmt::Debug for MetricCatalog<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCatalog")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}
