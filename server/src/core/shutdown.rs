//! Centralized shutdown management

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::data::topics::TopicService;

/// Coordinates graceful shutdown of the poller's background tasks
///
/// Producers (timer, re-sync, coordinator) stop first. Sinks get their own
/// signal once every producer has finished, so a pass still running at
/// shutdown is written before the sinks exit.
#[derive(Clone)]
pub struct ShutdownService {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    drain_tx: Arc<watch::Sender<bool>>,
    drain_rx: watch::Receiver<bool>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    sink_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    topics: Arc<TopicService>,
}

impl ShutdownService {
    pub fn new(topics: Arc<TopicService>) -> Self {
        let (tx, rx) = watch::channel(false);
        let (drain_tx, drain_rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            drain_tx: Arc::new(drain_tx),
            drain_rx,
            handles: Arc::new(Mutex::new(Vec::new())),
            sink_handles: Arc::new(Mutex::new(Vec::new())),
            topics,
        }
    }

    /// Register a producer task handle to be awaited during shutdown
    pub async fn register(&self, handle: JoinHandle<()>) {
        self.handles.lock().await.push(handle);
    }

    /// Register a sink task handle; awaited after every producer
    pub async fn register_sink(&self, handle: JoinHandle<()>) {
        self.sink_handles.lock().await.push(handle);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Receiver flipped only after every producer task has finished
    pub fn subscribe_sinks(&self) -> watch::Receiver<bool> {
        self.drain_rx.clone()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    /// Trigger shutdown and wait for all registered tasks to complete
    ///
    /// Order:
    /// 1. Signal timer, re-sync and coordinator to stop
    /// 2. Wait for them (an in-flight pass finishes and publishes first)
    /// 3. Signal sinks to drain and wait for them
    /// 4. Shutdown topic dispatchers
    pub async fn shutdown(&self) {
        tracing::debug!("Initiating graceful shutdown...");
        self.trigger();

        let handles = std::mem::take(&mut *self.handles.lock().await);
        Self::join_with_timeout(handles, "background").await;

        let _ = self.drain_tx.send(true);
        let sinks = std::mem::take(&mut *self.sink_handles.lock().await);
        Self::join_with_timeout(sinks, "sink").await;

        tracing::debug!("Shutting down topic dispatchers...");
        self.topics.shutdown().await;

        tracing::debug!("Shutdown complete");
    }

    async fn join_with_timeout(handles: Vec<JoinHandle<()>>, kind: &str) {
        tracing::debug!(count = handles.len(), kind, "Waiting for tasks to finish...");

        let timeout = Duration::from_secs(SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, futures::future::join_all(handles)).await {
            Ok(_) => tracing::debug!(kind, "All tasks completed"),
            Err(_) => {
                tracing::warn!(
                    kind,
                    timeout_secs = timeout.as_secs(),
                    "Timeout waiting for tasks"
                );
            }
        }
    }

    /// Resolves once shutdown has been triggered
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();
        async move {
            let _ = rx.wait_for(|&v| v).await;
        }
    }

    /// Install OS signal handlers and auto-trigger on Ctrl+C/SIGTERM
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut signal) => {
                        signal.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::debug!("Received Ctrl+C, shutting down"),
                _ = terminate => tracing::debug!("Received SIGTERM, shutting down"),
            }

            service.trigger();
        });
    }
}
