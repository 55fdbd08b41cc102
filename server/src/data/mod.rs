//! Data access layer
//!
//! - `provider` - metrics provider seam and the CloudWatch adapter
//! - `topics` - in-process pub/sub used between the timer, coordinator and sink

pub mod provider;
pub mod topics;

pub use provider::{CloudWatchProvider, MetricsProvider};
