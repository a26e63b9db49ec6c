//! Command output
//!
//! JSON output is wrapped in an [`Envelope`] carrying a schema identifier and
//! the generation time. Text output renders one line per item.

use chrono::{DateTime, SecondsFormat, Utc};
use idc_collect::{CollectResult, Metric, MetricValue};
use idc_config::ConfigPolicy;
use serde::{Deserialize, Serialize};

pub const SCHEMA_COLLECT: &str = "idc.collect.v1";
pub const SCHEMA_METRIC_TYPES: &str = "idc.metric_types.v1";
pub const SCHEMA_POLICY: &str = "idc.policy.v1";

/// Standard envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T: Serialize> {
    /// Schema version identifier (e.g., "idc.collect.v1")
    pub schema_version: String,

    /// When this output was generated
    pub generated_at: DateTime<Utc>,

    /// The actual data payload
    pub data: T,

    /// Soft failures worth surfacing next to the payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(schema_version: impl Into<String>, data: T) -> Self {
        Self {
            schema_version: schema_version.into(),
            generated_at: Utc::now(),
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {e}"}}"#))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {e}"}}"#))
    }
}

/// Wrap a cycle result, lifting warning messages into the envelope
pub fn collect_envelope(result: &CollectResult) -> Envelope<&CollectResult> {
    let warnings = result
        .warnings
        .iter()
        .map(|w| match &w.context {
            Some(context) => format!("{} ({context})", w.message),
            None => w.message.clone(),
        })
        .collect();
    Envelope::new(SCHEMA_COLLECT, result).with_warnings(warnings)
}

/// `namespace value timestamp key=value...`
pub fn metric_line(metric: &Metric) -> String {
    let value = match &metric.data {
        Some(MetricValue::Float(v)) => v.to_string(),
        Some(MetricValue::Text(s)) => format!("{s:?}"),
        None => "-".to_string(),
    };
    let mut line = format!(
        "{} {} {}",
        metric.namespace,
        value,
        metric.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    );
    for (key, tag) in &metric.tags {
        line.push_str(&format!(" {key}={tag}"));
    }
    line
}

pub fn render_collect(result: &CollectResult) -> String {
    let mut lines: Vec<String> = result.metrics.iter().map(metric_line).collect();
    for warning in &result.warnings {
        let context = warning
            .context
            .as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default();
        lines.push(format!("warning: {}{context}", warning.message));
    }
    lines.push(format!(
        "{} metrics, {} warnings in {}ms",
        result.total_metrics(),
        result.warnings.len(),
        result.duration.as_millis()
    ));
    lines.join("\n")
}

pub fn render_metric_types(types: &[Metric]) -> String {
    let mut lines = Vec::new();
    for metric in types {
        lines.push(metric.namespace.to_string());
        for element in metric.namespace.elements() {
            if let Some(name) = &element.name {
                lines.push(format!("  {name}: {}", element.description));
            }
        }
    }
    lines.join("\n")
}

pub fn render_policy(policy: &ConfigPolicy) -> String {
    let mut lines = vec![format!("/{}", policy.namespace.join("/"))];
    for rule in &policy.rules {
        let mut line = format!("  {}", rule.key);
        if rule.required {
            line.push_str(" (required)");
        }
        if let Some(default) = &rule.default {
            line.push_str(&format!(" default={default}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}
