//! Output sink for statistic batches

use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::{EventIdentity, StatisticBatch};
use crate::core::config::OutputFormat;
use crate::data::topics::{Topic, TopicError};

/// Writes each output event of a batch in the configured format
pub struct OutputSink {
    format: OutputFormat,
    out: Box<dyn Write + Send>,
}

impl OutputSink {
    /// JSON lines go to stdout
    pub fn new(format: OutputFormat) -> Self {
        Self::with_writer(format, Box::new(std::io::stdout()))
    }

    pub fn with_writer(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self { format, out }
    }

    /// `shutdown_rx` should only flip once every publisher has stopped
    pub fn start(
        mut self,
        topic: Topic<StatisticBatch>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut subscriber = topic.subscribe();

        tokio::spawn(async move {
            let mut shutdown_requested = false;

            loop {
                if shutdown_requested {
                    // Drain batches produced by the last pass
                    match tokio::time::timeout(Duration::from_millis(100), subscriber.recv()).await
                    {
                        Ok(Ok(batch)) => {
                            self.write(&batch);
                            continue;
                        }
                        Ok(Err(TopicError::Lagged(n))) => {
                            tracing::warn!(lagged = n, "OutputSink lagged during drain");
                            continue;
                        }
                        _ => break,
                    }
                }

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("OutputSink received shutdown, draining...");
                            shutdown_requested = true;
                        }
                    }
                    result = subscriber.recv() => {
                        match result {
                            Ok(batch) => self.write(&batch),
                            Err(TopicError::Lagged(n)) => {
                                tracing::warn!(lagged = n, "OutputSink lagged");
                            }
                            Err(_) => break,
                        }
                    }
                }
            }
            tracing::debug!("OutputSink shutdown complete");
        })
    }

    fn write(&mut self, batch: &StatisticBatch) {
        match self.format {
            OutputFormat::Json => {
                let lines = match render_json_lines(batch) {
                    Ok(lines) => lines,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize statistic batch");
                        return;
                    }
                };
                for line in lines {
                    if let Err(e) = writeln!(self.out, "{}", line) {
                        tracing::error!(error = %e, "Failed to write output");
                        return;
                    }
                }
                if let Err(e) = self.out.flush() {
                    tracing::error!(error = %e, "Failed to flush output");
                }
            }
            OutputFormat::Log => {
                for event in &batch.events {
                    match &event.identity {
                        EventIdentity::InstanceId(id) => {
                            tracing::info!(instance_id = %id, value = event.value, "Metric value");
                        }
                        EventIdentity::Dimensions(dimensions) => {
                            tracing::info!(
                                dimensions = ?dimensions,
                                value = event.value,
                                "Metric value"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// One JSON object per output event
pub fn render_json_lines(batch: &StatisticBatch) -> Result<Vec<String>, serde_json::Error> {
    batch.events.iter().map(serde_json::to_string).collect()
}
