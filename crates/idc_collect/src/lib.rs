//! idc_collect - InfluxDB data collection
//!
//! This crate provides:
//! - The Collector trait driven by the host once per collection cycle
//! - A keyed connection pool with a background idle reaper
//! - The database client seam and an HTTP client for the InfluxDB query API
//! - The translator turning query results into namespaced metric records
//!
//! # Failure model
//!
//! 1. **Hard errors abort the cycle**: bad settings, connection setup failure,
//!    query or response errors
//! 2. **Soft errors are warnings**: malformed rows, unparsable values or
//!    timestamps, an empty result; they are logged and returned alongside
//!    the metrics

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod client;
pub mod collector;
pub mod http;
pub mod metric;
pub mod namespace;
pub mod pool;
pub mod translate;
pub mod value;

#[cfg(test)]
mod testing;

pub use client::{
    ClientError, ConnectParams, ConnectionKey, Connector, Query, QueryClient, QueryResponse,
    Series, StatementResult,
};
pub use collector::InfluxDataCollector;
pub use http::{HttpClient, HttpConnector};
pub use metric::{Metric, MetricDescriptor, MetricValue};
pub use namespace::{Namespace, NamespaceElement};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledClient, ReaperHandle};
pub use translate::{Translation, translate};
pub use value::{ColumnValue, ConversionError};

use idc_config::ConfigPolicy;

/// Name of the collector
pub const NAME: &str = "influxdb-data";

/// Schema version stamped on every metric record
pub const VERSION: u32 = 1;

/// Collection errors
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Configuration error: {0}")]
    Config(#[from] idc_config::ConfigError),

    #[error("Cannot connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: ClientError,
    },

    #[error(
        "error in response from InfluxDB, requested_metric: {namespace}, query: {query}, query_error: {}, response_error: {}",
        display_or_none(.query_error),
        display_or_none(.response_error)
    )]
    Query {
        namespace: String,
        query: String,
        query_error: Option<ClientError>,
        response_error: Option<String>,
    },

    #[error("incorrect format of namespace {namespace}, namespace length {len}")]
    Namespace { namespace: String, len: usize },
}

fn display_or_none<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "<nil>".to_string(), ToString::to_string)
}

/// Warning from collection, logged at warn level when raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Warning kind
    pub kind: WarningKind,
    /// Warning message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
}

impl Warning {
    /// Create a warning of the given kind
    pub fn warn(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to this warning
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// What kind of soft failure a warning reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Row value count differs from the series column count
    RowFormat,
    /// Value column could not be converted
    ValueConversion,
    /// Time column could not be parsed
    TimeConversion,
    /// The whole cycle produced nothing
    EmptyResult,
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Result of one collection cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectResult {
    /// Metric records in (descriptor, series, row) order
    pub metrics: Vec<Metric>,

    /// Non-fatal warnings encountered
    pub warnings: Vec<Warning>,

    /// Collection duration
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl CollectResult {
    /// Create an empty result
    pub fn empty() -> Self {
        Self {
            metrics: vec![],
            warnings: vec![],
            duration: Duration::ZERO,
        }
    }

    /// Set the duration for this result
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Add a warning to this result
    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warnings.push(warning);
        self
    }

    /// Total number of metrics collected
    pub fn total_metrics(&self) -> usize {
        self.metrics.len()
    }

    /// Check if any warnings were generated
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Count warnings of one kind
    pub fn warnings_of(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// The core Collector trait
#[async_trait]
pub trait Collector: Send + Sync {
    /// Unique name for this collector
    fn name(&self) -> &'static str;

    /// Schema version for data format
    fn version(&self) -> u32 {
        VERSION
    }

    /// Metric types this collector can produce
    fn metric_types(&self) -> Vec<Metric>;

    /// Settings accepted by each requested metric
    fn config_policy(&self) -> ConfigPolicy;

    /// Run one collection cycle over the requested metrics
    async fn collect(&self, requested: &[MetricDescriptor]) -> Result<CollectResult, CollectError>;
}
