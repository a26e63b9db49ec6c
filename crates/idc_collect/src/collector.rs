//! The InfluxDB data collector
//!
//! One cycle walks the requested descriptors in order: check the namespace,
//! resolve settings, borrow a pooled client, run the query, translate the
//! response. The first hard error aborts the whole cycle.

use async_trait::async_trait;
use chrono::Utc;
use idc_config::{ConfigPolicy, QuerySettings};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::client::{ConnectParams, Query};
use crate::metric::{self, Metric, MetricDescriptor};
use crate::namespace::NAMESPACE_LEN;
use crate::pool::ConnectionPool;
use crate::translate::translate;
use crate::{CollectError, CollectResult, Collector, NAME, Warning, WarningKind};

/// Collector backed by a shared connection pool
pub struct InfluxDataCollector {
    pool: Arc<ConnectionPool>,
}

impl InfluxDataCollector {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Query and translate a single descriptor
    async fn collect_one(
        &self,
        descriptor: &MetricDescriptor,
        result: &mut CollectResult,
    ) -> Result<(), CollectError> {
        if descriptor.namespace.len() != NAMESPACE_LEN {
            return Err(CollectError::Namespace {
                namespace: descriptor.namespace.to_string(),
                len: descriptor.namespace.len(),
            });
        }
        let settings = QuerySettings::resolve(&descriptor.config)?;

        let client = self
            .pool
            .acquire(&ConnectParams::new(
                &settings.host,
                &settings.user,
                &settings.password,
            ))
            .await?;

        let query = Query::new(&settings.query, &settings.database);
        let collected_at = Utc::now();
        let response = match client.query(&query).await {
            Ok(response) if response.error().is_none() => response,
            Ok(response) => {
                return Err(CollectError::Query {
                    namespace: descriptor.namespace.to_string(),
                    query: settings.query,
                    query_error: None,
                    response_error: response.error().map(str::to_string),
                });
            }
            Err(e) => {
                return Err(CollectError::Query {
                    namespace: descriptor.namespace.to_string(),
                    query: settings.query,
                    query_error: Some(e),
                    response_error: None,
                });
            }
        };
        drop(client);

        let translation = translate(&response, descriptor, &settings.data_type, collected_at)?;
        debug!(
            namespace = %descriptor.namespace,
            metrics = translation.metrics.len(),
            warnings = translation.warnings.len(),
            "Translated query response"
        );

        result.metrics.extend(translation.metrics);
        result.warnings.extend(translation.warnings);
        Ok(())
    }
}

#[async_trait]
impl Collector for InfluxDataCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn metric_types(&self) -> Vec<Metric> {
        metric::metric_types()
    }

    fn config_policy(&self) -> ConfigPolicy {
        ConfigPolicy::influx()
    }

    #[instrument(skip_all, fields(requested = requested.len()))]
    async fn collect(&self, requested: &[MetricDescriptor]) -> Result<CollectResult, CollectError> {
        let start = Instant::now();
        let mut result = CollectResult::empty();

        for descriptor in requested {
            self.collect_one(descriptor, &mut result).await?;
        }

        if result.metrics.is_empty() {
            let namespaces: Vec<String> = requested.iter().map(|d| d.namespace.to_string()).collect();
            warn!(requested_metrics = ?namespaces, "nothing has been collected");
            result.warnings.push(
                Warning::warn(WarningKind::EmptyResult, "nothing has been collected")
                    .with_context(namespaces.join(", ")),
            );
        }

        Ok(result.with_duration(start.elapsed()))
    }
}
