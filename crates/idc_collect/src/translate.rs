//! Query result to metric translation
//!
//! The column set of a result is only known at runtime. Each column is
//! classified once per series as the value column, the `time` column or a
//! tag column, then every well-formed row becomes one [`Metric`].

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::client::QueryResponse;
use crate::metric::{Metric, MetricDescriptor};
use crate::namespace::{
    DATA_TYPE_POSITION, NAMESPACE_LEN, SERIES_POSITION, SERIES_WILDCARD, sanitize_series_name,
};
use crate::value::{convert_value, parse_timestamp};
use crate::{CollectError, VERSION, Warning, WarningKind};

/// Name of the column holding the row timestamp
pub const TIME_COLUMN: &str = "time";

/// Metrics and soft failures from one response
#[derive(Debug, Clone, Default)]
pub struct Translation {
    pub metrics: Vec<Metric>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
    Value,
    Time,
    Tag,
}

impl ColumnRole {
    fn classify(column: &str, data_type: &str) -> Self {
        if column == data_type {
            Self::Value
        } else if column == TIME_COLUMN {
            Self::Time
        } else {
            Self::Tag
        }
    }
}

/// Translate one query response for the requesting descriptor.
///
/// `data_type` names the value column. Records whose time column is absent,
/// unparsable or zero keep `collected_at` as their timestamp.
///
/// # Errors
/// Returns [`CollectError::Namespace`] if the requested namespace does not
/// have exactly five elements. Row-level problems are warnings.
pub fn translate(
    response: &QueryResponse,
    descriptor: &MetricDescriptor,
    data_type: &str,
    collected_at: DateTime<Utc>,
) -> Result<Translation, CollectError> {
    let requested = &descriptor.namespace;
    if requested.len() != NAMESPACE_LEN {
        return Err(CollectError::Namespace {
            namespace: requested.to_string(),
            len: requested.len(),
        });
    }

    let requested_series = requested
        .element(SERIES_POSITION)
        .map(|e| e.value.as_str())
        .unwrap_or_default();

    let mut out = Translation::default();

    for series in response.results.iter().flat_map(|r| &r.series) {
        let series_name = sanitize_series_name(&series.name);
        if requested_series != SERIES_WILDCARD && series_name != requested_series {
            continue;
        }

        let mut namespace = requested.clone();
        namespace.set_value(SERIES_POSITION, series_name.as_str());
        namespace.set_value(DATA_TYPE_POSITION, data_type);

        let roles: Vec<ColumnRole> = series
            .columns
            .iter()
            .map(|c| ColumnRole::classify(c, data_type))
            .collect();

        for row in &series.values {
            if row.len() != series.columns.len() {
                warn!(
                    requested_series,
                    columns = ?series.columns,
                    values = ?row,
                    "incorrect format of response from InfluxDB, number of columns should equal number of values"
                );
                out.warnings.push(
                    Warning::warn(
                        WarningKind::RowFormat,
                        format!(
                            "row has {} values for {} columns",
                            row.len(),
                            series.columns.len()
                        ),
                    )
                    .with_context(namespace.to_string()),
                );
                continue;
            }

            let mut metric = Metric {
                namespace: namespace.clone(),
                tags: descriptor.tags.clone(),
                timestamp: collected_at,
                data: None,
                version: VERSION,
            };

            for ((column, role), value) in series.columns.iter().zip(&roles).zip(row) {
                match role {
                    ColumnRole::Value => match convert_value(value) {
                        Ok(converted) => metric.data = Some(converted),
                        Err(e) => {
                            warn!(
                                error = %e,
                                value_type = value.kind(),
                                namespace = %metric.namespace,
                                "cannot convert type of value"
                            );
                            out.warnings.push(
                                Warning::warn(WarningKind::ValueConversion, e.to_string())
                                    .with_context(metric.namespace.to_string()),
                            );
                        }
                    },
                    ColumnRole::Time => match parse_timestamp(value) {
                        // Zero means the database left the time unset
                        Ok(0) => {}
                        Ok(nanos) => metric.timestamp = DateTime::from_timestamp_nanos(nanos),
                        Err(e) => {
                            warn!(error = %e, namespace = %metric.namespace, "cannot convert time");
                            out.warnings.push(
                                Warning::warn(WarningKind::TimeConversion, e.to_string())
                                    .with_context(metric.namespace.to_string()),
                            );
                        }
                    },
                    ColumnRole::Tag => {
                        metric.tags.insert(column.clone(), value.to_tag_string());
                    }
                }
            }

            out.metrics.push(metric);
        }
    }

    Ok(out)
}
