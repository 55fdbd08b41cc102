//! Metric polling domain
//!
//! - `catalog` - discovered units, guarded by one mutex
//! - `executor` - one query pass over the catalog
//! - `coordinator` - trigger batching and result publishing
//! - `extract` - statistic selection from a result set
//! - `unit` - what a pass queries (descriptor or resource instance)
//! - `trigger` - interval trigger source
//! - `sink` - writes published statistic batches

pub mod catalog;
pub mod coordinator;
pub mod executor;
pub mod extract;
pub mod sink;
pub mod trigger;
pub mod types;
pub mod unit;

pub use catalog::MetricCatalog;
pub use coordinator::BatchCoordinator;
pub use executor::{PassReport, QueryExecutor};
pub use sink::OutputSink;
pub use trigger::start_trigger_timer;
pub use types::{
    DataPoint, EventIdentity, MetricDescriptor, OutputEvent, PointOrder, QueryConfig, Statistic,
    StatisticBatch, StatisticsQuery, TriggerEvent,
};
pub use unit::{QueryableUnit, ResourceInstance};

use crate::data::topics::TopicMessage;

impl TopicMessage for TriggerEvent {
    fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

impl TopicMessage for StatisticBatch {
    fn size_bytes(&self) -> usize {
        self.events
            .iter()
            .map(|e| match &e.identity {
                EventIdentity::InstanceId(id) => id.len() + 16,
                EventIdentity::Dimensions(dims) => dims
                    .iter()
                    .map(|(k, v)| k.len() + v.iter().map(String::len).sum::<usize>())
                    .sum::<usize>()
                    + 16,
            })
            .sum::<usize>()
            .max(100)
    }
}
