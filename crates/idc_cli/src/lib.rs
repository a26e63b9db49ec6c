//! idc_cli - CLI commands for the InfluxDB data collector
//!
//! This crate provides:
//! - clap-based command definitions
//! - The host loop driving collection cycles
//! - JSON envelope and text output

use clap::{Parser, Subcommand, ValueEnum};
use idc_collect::{
    CollectError, CollectResult, Collector, ConnectionPool, Connector, HttpConnector,
    InfluxDataCollector, MetricDescriptor, PoolConfig,
};
use idc_config::IdcConfig;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

pub mod report;

pub use report::Envelope;

/// CLI errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config error: {0}")]
    ConfigError(#[from] idc_config::ConfigError),

    #[error("Collection error: {0}")]
    CollectError(#[from] CollectError),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON envelope
    Json,
    /// Human-readable text
    Text,
}

/// Main CLI application
#[derive(Parser, Debug)]
#[command(name = "idc")]
#[command(author, version, about = "InfluxDB data collector")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for commands
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one collection cycle and print the result
    Collect,

    /// Collect every poll interval until interrupted
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Print the metric catalogue
    MetricTypes,

    /// Print the per-metric settings policy
    Policy,
}

impl Cli {
    /// Load the configuration named by `--config`, or discover one
    pub fn load_config(&self) -> Result<IdcConfig, CliError> {
        let config = match &self.config {
            Some(path) => IdcConfig::load_with_env(path)?,
            None => IdcConfig::discover_with_env()?,
        };
        Ok(config)
    }

    /// Run the CLI against the HTTP client
    pub async fn run(self, config: IdcConfig) -> Result<(), CliError> {
        let connector = Arc::new(HttpConnector::new().with_timeout(config.query_timeout()));
        self.run_with(config, connector).await
    }

    /// Run the CLI with an explicit connector
    pub async fn run_with(
        self,
        config: IdcConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<(), CliError> {
        match self.command {
            Commands::Collect => {
                let (_, collector) = build_collector(&config, connector);
                let result = collector.collect(&descriptors(&config)).await?;
                print_collect(&result, self.format);
            }
            Commands::Run { cycles } => {
                run_loop(&config, connector, cycles, self.format, shutdown_signal()).await?;
            }
            Commands::MetricTypes => {
                let types = idc_collect::metric::metric_types();
                match self.format {
                    OutputFormat::Json => println!(
                        "{}",
                        Envelope::new(report::SCHEMA_METRIC_TYPES, &types).to_json_pretty()
                    ),
                    OutputFormat::Text => println!("{}", report::render_metric_types(&types)),
                }
            }
            Commands::Policy => {
                let policy = idc_config::ConfigPolicy::influx();
                match self.format {
                    OutputFormat::Json => println!(
                        "{}",
                        Envelope::new(report::SCHEMA_POLICY, &policy).to_json_pretty()
                    ),
                    OutputFormat::Text => println!("{}", report::render_policy(&policy)),
                }
            }
        }

        Ok(())
    }
}

/// Requested metrics from the config, in file order
pub fn descriptors(config: &IdcConfig) -> Vec<MetricDescriptor> {
    config.metrics.iter().map(MetricDescriptor::from).collect()
}

/// Build the pool and the collector sharing it
pub fn build_collector(
    config: &IdcConfig,
    connector: Arc<dyn Connector>,
) -> (Arc<ConnectionPool>, InfluxDataCollector) {
    let pool = ConnectionPool::new(connector, PoolConfig::from(&config.pool));
    let collector = InfluxDataCollector::new(Arc::clone(&pool));
    (pool, collector)
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Collect every poll interval until `shutdown` resolves or `cycles` runs.
///
/// A failed cycle is logged; the next one starts from scratch. Shutdown
/// abandons a cycle that is still in flight.
async fn run_loop(
    config: &IdcConfig,
    connector: Arc<dyn Connector>,
    cycles: Option<u64>,
    format: OutputFormat,
    shutdown: impl Future<Output = ()>,
) -> Result<(), CliError> {
    let (pool, collector) = build_collector(config, connector);
    let requested = descriptors(config);
    let reaper = pool.start();

    info!(
        metrics = requested.len(),
        poll_interval_secs = config.global.poll_interval_secs,
        "Starting collection loop"
    );

    let mut ticker = tokio::time::interval(config.poll_interval());
    let mut completed = 0u64;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = ticker.tick() => {
                let outcome = tokio::select! {
                    result = collector.collect(&requested) => Some(result),
                    () = &mut shutdown => None,
                };
                match outcome {
                    Some(Ok(result)) => print_cycle(&result, format),
                    Some(Err(e)) => error!(error = %e, "Collection cycle failed"),
                    None => {
                        info!("Shutting down, abandoning in-flight cycle");
                        break;
                    }
                }
                completed += 1;
                if cycles.is_some_and(|max| completed >= max) {
                    break;
                }
            }
        }
    }

    reaper.shutdown().await;
    info!(cycles = completed, stats = ?pool.stats(), "Collection loop stopped");
    Ok(())
}

fn print_collect(result: &CollectResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", report::collect_envelope(result).to_json_pretty()),
        OutputFormat::Text => println!("{}", report::render_collect(result)),
    }
}

/// One line per cycle in JSON mode
fn print_cycle(result: &CollectResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", report::collect_envelope(result).to_json()),
        OutputFormat::Text => println!("{}", report::render_collect(result)),
    }
}
