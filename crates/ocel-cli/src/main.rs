//! ocelgraph - load OCEL event logs into Neo4j.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::Cli;

/// Initialize tracing with optional file logging.
///
/// `RUST_LOG` takes precedence over the default filter.
fn init_tracing(log_file: Option<&std::path::Path>, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "ocelgraph=debug,ocel_graph=debug,ocel_core=debug"
    } else {
        "ocelgraph=info,ocel_graph=info,ocel_core=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The log file may come from the config, so tracing starts after loading it.
    // A config error is still reported through the subscriber.
    let config = cli.load_config();
    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.as_ref().ok().and_then(|c| c.log_file.clone()));
    init_tracing(log_file.as_deref(), cli.verbose)?;

    let config = config.inspect_err(|e| tracing::error!(error = %format!("{:#}", e), "Invalid configuration"))?;
    cli.execute(config).await
}
