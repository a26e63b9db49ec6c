#![allow(dead_code)]

use async_trait::async_trait;
use idc_collect::{ClientError, ConnectParams, Connector, Query, QueryClient, QueryResponse};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tempfile::NamedTempFile;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing once for integration tests.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(filter)
            .init();
    });
}

/// Write a TOML config to a temp file that lives as long as the handle.
pub fn temp_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Config with one descriptor per query, all against the same endpoint.
pub fn config_toml(queries: &[(&str, &str)]) -> String {
    let mut toml = String::from("[global]\npoll_interval_secs = 1\n");
    for (series, query) in queries {
        toml.push_str(&format!(
            r#"
[[metrics]]
namespace = ["intel", "influxdb-data", "{series}", "value", "data"]

[metrics.tags]
source = "integration"

[metrics.settings]
host = "http://localhost:8086"
database = "telegraf"
user = "admin"
password = "secret"
query = "{query}"
"#
        ));
    }
    toml
}

/// Connector answering every query with a canned JSON body
pub struct CannedConnector {
    body: String,
    connects: AtomicUsize,
    queries: Arc<AtomicUsize>,
}

impl CannedConnector {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            connects: AtomicUsize::new(0),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CannedConnector {
    async fn connect(&self, _params: &ConnectParams) -> Result<Arc<dyn QueryClient>, ClientError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CannedClient {
            body: self.body.clone(),
            queries: Arc::clone(&self.queries),
        }))
    }
}

struct CannedClient {
    body: String,
    queries: Arc<AtomicUsize>,
}

#[async_trait]
impl QueryClient for CannedClient {
    async fn query(&self, _query: &Query) -> Result<QueryResponse, ClientError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        serde_json::from_str(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn close(&self) -> Result<(), ClientError> {
        Ok(())
    }
}
