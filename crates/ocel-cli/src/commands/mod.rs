//! CLI command definitions and handlers.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ocel_core::Config;

pub mod load;
pub mod schema;
pub mod status;

/// Load object-centric event logs into a Neo4j property graph
#[derive(Parser)]
#[command(name = "ocelgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (JSON, or TOML by extension)
    #[arg(short, long, global = true, env = "OCELGRAPH_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Event log to load, overriding `data_file` from the config
    #[arg(long, global = true)]
    pub data_file: Option<PathBuf>,

    /// Rows per write transaction, overriding `batch_size` from the config
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Also write logs to this file (without colors)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reset the schema and load the event log
    Load(load::LoadArgs),

    /// Drop and recreate constraints and indexes only
    Schema,

    /// Show node and relationship counts
    Status,
}

impl Cli {
    /// Read the config file and apply command-line overrides.
    ///
    /// Without a config file the `NEO4J_*` variables are enough for `schema`
    /// and `status`; `load` also needs `--data-file`.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = if self.config.exists() {
            Config::load(&self.config)
                .with_context(|| format!("Failed to load {}", self.config.display()))?
        } else {
            if matches!(self.command, Commands::Load(_)) && self.data_file.is_none() {
                return Err(anyhow!(
                    "Config file {} not found. Create it or pass --data-file.",
                    self.config.display()
                ));
            }
            let mut config = Config::with_data_file(self.data_file.clone().unwrap_or_default());
            config.apply_env();
            config
        };

        if let Some(data_file) = &self.data_file {
            config.data_file = data_file.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Load(args) => load::execute(args, config).await,
            Commands::Schema => schema::execute(&config).await,
            Commands::Status => status::execute(&config).await,
        }
    }
}
