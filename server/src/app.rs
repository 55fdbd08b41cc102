//! Core application

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands};
use crate::core::config::{AppConfig, CatalogMode};
use crate::core::constants::{
    APP_NAME_LOWER, ENV_LOG, INSTANCE_ID_DIMENSION, TOPIC_STATISTICS, TOPIC_TRIGGERS,
};
use crate::core::shutdown::ShutdownService;
use crate::data::provider::{CloudWatchProvider, ConnectionError, MetricsProvider};
use crate::data::topics::TopicService;
use crate::domain::{
    BatchCoordinator, MetricCatalog, MetricDescriptor, OutputSink, QueryExecutor, QueryableUnit,
    ResourceInstance, StatisticBatch, TriggerEvent, start_trigger_timer,
};

pub struct CoreApp {
    pub config: AppConfig,
    pub provider: Arc<dyn MetricsProvider>,
    pub topics: Arc<TopicService>,
    pub shutdown: ShutdownService,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        let app = Self::init(&cli_config).await?;
        match command {
            Some(Commands::Discover) => app.discover().await,
            Some(Commands::Start) | None => app.start().await,
        }
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;

        let provider: Arc<dyn MetricsProvider> = Arc::new(
            CloudWatchProvider::connect(&config.aws)
                .await
                .context("Failed to initialize CloudWatch client")?,
        );
        let topics = Arc::new(TopicService::new());
        let shutdown = ShutdownService::new(topics.clone());

        Ok(Self {
            config,
            provider,
            topics,
            shutdown,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    /// Discover the catalog once and print one unit per line
    async fn discover(self) -> Result<()> {
        match self.config.metric.mode {
            CatalogMode::Descriptor => {
                let catalog = MetricCatalog::descriptors();
                self.print_catalog(&catalog).await
            }
            CatalogMode::Instance => {
                let catalog = self.instance_catalog();
                self.print_catalog(&catalog).await
            }
        }
    }

    async fn print_catalog<U: QueryableUnit>(&self, catalog: &MetricCatalog<U>) -> Result<()> {
        let units = load_catalog(catalog, self.provider.as_ref(), &self.config.metric.name)
            .await
            .context("Unable to connect to CloudWatch, make sure your credentials are correct")?;
        for unit in catalog.snapshot().await {
            println!("{}", unit);
        }
        tracing::info!(metric = %self.config.metric.name, units, "Discovery complete");
        Ok(())
    }

    async fn start(self) -> Result<()> {
        match self.config.metric.mode {
            CatalogMode::Descriptor => {
                let catalog: MetricCatalog<MetricDescriptor> = MetricCatalog::descriptors();
                self.poll(catalog).await
            }
            CatalogMode::Instance => {
                let catalog = self.instance_catalog();
                self.poll(catalog).await
            }
        }
    }

    fn instance_catalog(&self) -> MetricCatalog<ResourceInstance> {
        MetricCatalog::instances(self.config.metric.namespace.clone(), INSTANCE_ID_DIMENSION)
    }

    async fn poll<U: QueryableUnit>(self, catalog: MetricCatalog<U>) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        self.shutdown.install_signal_handlers();

        let units = load_catalog(&catalog, self.provider.as_ref(), &self.config.metric.name)
            .await
            .context("Unable to connect to CloudWatch, make sure your credentials are correct")?;
        let catalog = Arc::new(catalog);

        banner::print_banner(&self.config, self.provider.name(), units);

        self.start_background_tasks(catalog).await?;

        self.shutdown.wait().await;
        self.shutdown.shutdown().await;
        Ok(())
    }

    /// Subscribers are started before the trigger timer so the first trigger is not lost
    async fn start_background_tasks<U: QueryableUnit>(
        &self,
        catalog: Arc<MetricCatalog<U>>,
    ) -> Result<()> {
        let triggers = self
            .topics
            .topic::<TriggerEvent>(TOPIC_TRIGGERS)
            .map_err(|e| anyhow::anyhow!("Failed to create triggers topic: {}", e))?;
        let statistics = self
            .topics
            .topic::<StatisticBatch>(TOPIC_STATISTICS)
            .map_err(|e| anyhow::anyhow!("Failed to create statistics topic: {}", e))?;

        let sink = OutputSink::new(self.config.output.format);
        self.shutdown
            .register_sink(sink.start(statistics.clone(), self.shutdown.subscribe_sinks()))
            .await;

        let executor = QueryExecutor::new(
            self.config.query_config(),
            self.config.query_timeout(),
            self.config.poll.concurrency,
        );
        let coordinator = BatchCoordinator::new(
            Arc::clone(&catalog),
            executor,
            Arc::clone(&self.provider),
            statistics.publisher(),
        );
        self.shutdown
            .register(coordinator.start(triggers.clone(), self.shutdown.subscribe()))
            .await;

        if let Some(handle) = catalog.start_resync_task(
            Arc::clone(&self.provider),
            self.config.metric.name.clone(),
            self.config.metric.resync_minutes,
            self.shutdown.subscribe(),
        ) {
            self.shutdown.register(handle).await;
        }

        self.shutdown
            .register(start_trigger_timer(
                triggers.publisher(),
                Duration::from_secs(self.config.poll.interval_secs),
                self.shutdown.subscribe(),
            ))
            .await;

        tracing::debug!("Background tasks started");
        Ok(())
    }
}

/// Initial catalog sync; any discovery failure here is fatal
pub async fn load_catalog<U: QueryableUnit>(
    catalog: &MetricCatalog<U>,
    provider: &dyn MetricsProvider,
    metric_name: &str,
) -> Result<usize, ConnectionError> {
    let units = catalog.sync(provider, metric_name).await?;
    if units == 0 {
        tracing::warn!(metric = metric_name, "No metrics found, passes will emit nothing");
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::memory::MemoryProvider;

    #[tokio::test]
    async fn test_startup_discovery_failure_is_fatal() {
        let provider = MemoryProvider::new();
        provider.push_metrics_error("The security token included in the request is invalid");
        let catalog = MetricCatalog::descriptors();

        let err = load_catalog(&catalog, &provider, "CPUCreditBalance")
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectionError::Discovery(_)));
        assert!(catalog.is_empty().await);
    }

    #[tokio::test]
    async fn test_startup_discovery_loads_instances() {
        let provider = MemoryProvider::new();
        provider.push_metrics(vec![
            MetricDescriptor::new("CPUCreditBalance", "AWS/EC2")
                .with_dimension(INSTANCE_ID_DIMENSION, "i-1"),
        ]);
        let catalog = MetricCatalog::instances("AWS/EC2", INSTANCE_ID_DIMENSION);

        let units = load_catalog(&catalog, &provider, "CPUCreditBalance")
            .await
            .unwrap();

        assert_eq!(units, 1);
        assert_eq!(catalog.snapshot().await[0].instance_id, "i-1");
    }
}
