//! Metric requests and records

use chrono::{DateTime, Utc};
use idc_config::{MetricConfig, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::namespace::Namespace;
use crate::VERSION;

/// A requested metric: namespace, static tags and descriptor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    pub namespace: Namespace,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    pub config: Settings,
}

impl MetricDescriptor {
    pub fn new(namespace: Namespace, config: Settings) -> Self {
        Self {
            namespace,
            tags: BTreeMap::new(),
            config,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl From<&MetricConfig> for MetricDescriptor {
    fn from(config: &MetricConfig) -> Self {
        Self {
            namespace: Namespace::from_strings(config.namespace.iter().cloned()),
            tags: config.tags.clone(),
            config: Settings::from(config.settings.clone()),
        }
    }
}

/// Converted metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

/// One emitted observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub namespace: Namespace,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    /// `None` when the value column could not be converted
    pub data: Option<MetricValue>,
    pub version: u32,
}

/// The metric type catalogue exposed to the host
pub fn metric_types() -> Vec<Metric> {
    vec![Metric {
        namespace: Namespace::new(["intel", crate::NAME])
            .add_dynamic_element("series", "name of series in influxdb")
            .add_dynamic_element("data_type", "type of data")
            .add_static_element("data"),
        tags: BTreeMap::new(),
        timestamp: DateTime::<Utc>::UNIX_EPOCH,
        data: None,
        version: VERSION,
    }]
}
