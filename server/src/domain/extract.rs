//! Statistic selection from a provider result set

use super::types::{DataPoint, PointOrder, Statistic};

/// Outcome of extracting the latest value from one result set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extracted {
    /// No data points in the lookback window
    Empty,
    /// The newest point lacked the requested statistic
    Missing,
    Value(f64),
}

/// Pick the most recent point per `order` and extract `statistic` from it
pub fn extract_latest(points: &[DataPoint], statistic: Statistic, order: PointOrder) -> Extracted {
    match order.newest(points) {
        None => Extracted::Empty,
        Some(point) => match point.value(statistic) {
            Some(value) => Extracted::Value(value),
            None => Extracted::Missing,
        },
    }
}
