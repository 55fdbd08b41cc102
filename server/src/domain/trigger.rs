//! Interval trigger source

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::types::TriggerEvent;
use crate::data::topics::Publisher;

/// Publish a `TriggerEvent` every `interval`
///
/// The first tick fires immediately so a value is produced right after startup.
pub fn start_trigger_timer(
    publisher: Publisher<TriggerEvent>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = timer.tick() => {
                    if let Err(e) = publisher.publish(TriggerEvent::now()) {
                        tracing::warn!(error = %e, "Failed to publish trigger");
                    }
                }
            }
        }
        tracing::debug!("Trigger timer stopped");
    })
}
