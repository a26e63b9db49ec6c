//! InfluxDB data collector
//!
//! This is the main entry point for the `idc` binary.

use anyhow::Result;
use clap::Parser;
use idc_cli::Cli;
use idc_config::GlobalConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    init_tracing(&config.global, cli.verbose);

    cli.run(config).await?;

    Ok(())
}

/// RUST_LOG wins, then `--verbose`, then the configured level
fn init_tracing(global: &GlobalConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { global.log_level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if global.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
