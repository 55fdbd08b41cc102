//! Domain types shared by the catalog, executor and coordinator

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dimension name to dimension values
pub type Dimensions = BTreeMap<String, Vec<String>>;

// =============================================================================
// Statistic
// =============================================================================

/// Aggregation field selected from a returned data point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    #[default]
    #[serde(alias = "average")]
    Average,
    #[serde(alias = "sum")]
    Sum,
    #[serde(alias = "sample_count", alias = "samplecount")]
    SampleCount,
    #[serde(alias = "maximum")]
    Maximum,
    #[serde(alias = "minimum")]
    Minimum,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::Average,
        Statistic::Sum,
        Statistic::SampleCount,
        Statistic::Maximum,
        Statistic::Minimum,
    ];

    /// Provider spelling of the statistic
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::SampleCount => "SampleCount",
            Statistic::Maximum => "Maximum",
            Statistic::Minimum => "Minimum",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        Statistic::ALL
            .into_iter()
            .find(|stat| stat.as_str().to_lowercase() == normalized)
            .ok_or_else(|| {
                format!(
                    "Invalid statistic '{}'. Valid options: Average, Sum, SampleCount, Maximum, Minimum",
                    s
                )
            })
    }
}

// =============================================================================
// Point Order
// =============================================================================

/// Which end of a provider result sequence holds the most recent data point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrder {
    #[default]
    NewestFirst,
    NewestLast,
}

impl PointOrder {
    /// Pick the most recent point of a result sequence
    pub fn newest<'a>(&self, points: &'a [DataPoint]) -> Option<&'a DataPoint> {
        match self {
            PointOrder::NewestFirst => points.first(),
            PointOrder::NewestLast => points.last(),
        }
    }
}

impl fmt::Display for PointOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointOrder::NewestFirst => write!(f, "newest_first"),
            PointOrder::NewestLast => write!(f, "newest_last"),
        }
    }
}

// =============================================================================
// Provider Data
// =============================================================================

/// One queryable series as discovered from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub name: String,
    pub namespace: String,
    pub dimensions: Dimensions,
}

impl MetricDescriptor {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            dimensions: Dimensions::new(),
        }
    }

    pub fn with_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }
}

impl fmt::Display for MetricDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)?;
        if !self.dimensions.is_empty() {
            let dims: Vec<String> = self
                .dimensions
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.join("|")))
                .collect();
            write!(f, "{{{}}}", dims.join(","))?;
        }
        Ok(())
    }
}

/// A single statistics data point returned by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub sample_count: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
}

impl DataPoint {
    /// Value of the given statistic, if the provider returned it
    pub fn value(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Average => self.average,
            Statistic::Sum => self.sum,
            Statistic::SampleCount => self.sample_count,
            Statistic::Maximum => self.maximum,
            Statistic::Minimum => self.minimum,
        }
    }
}

/// Statistics request for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsQuery {
    pub period_secs: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub metric_name: String,
    pub namespace: String,
    pub statistic: Statistic,
    pub dimensions: Dimensions,
}

// =============================================================================
// Query Config
// =============================================================================

/// Per-pass query parameters (immutable for the process lifetime)
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub metric_name: String,
    pub lookback_minutes: u32,
    pub period_minutes: u32,
    pub statistic: Statistic,
    pub order: PointOrder,
}

impl QueryConfig {
    /// Provider period in seconds
    pub fn period_secs(&self) -> i32 {
        i32::try_from(u64::from(self.period_minutes) * 60).unwrap_or(i32::MAX)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Identifying payload attached to an output event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventIdentity {
    Dimensions(Dimensions),
    InstanceId(String),
}

/// Latest statistic value of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    #[serde(flatten)]
    pub identity: EventIdentity,
    pub value: f64,
}

/// All output events produced by one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticBatch {
    pub produced_at: DateTime<Utc>,
    pub events: Vec<OutputEvent>,
}

/// Inbound pulse; the payload is informational only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub fired_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn now() -> Self {
        Self {
            fired_at: Utc::now(),
        }
    }
}
