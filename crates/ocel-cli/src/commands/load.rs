//! `ocelgraph load`: reset the schema and run the full pipeline.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use ocel_core::log::read_event_log;
use ocel_core::{Config, EventLog};
use ocel_graph::{GraphClient, GraphStore, MemoryGraph, Pipeline};

use crate::output;

#[derive(Args)]
pub struct LoadArgs {
    /// Load into an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Run the case, activity, resource and object stages one after another
    #[arg(long)]
    pub sequential: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: LoadArgs, mut config: Config) -> Result<()> {
    if args.sequential {
        config.parallel_stages = false;
    }

    let data_file = config.require_data_file()?;
    let log = read_event_log(data_file)
        .with_context(|| format!("Failed to read event log {}", data_file.display()))?;

    if !args.json {
        println!(
            "{} {} ({} events, batch size {})",
            "Loading".bold(),
            config.data_file.display().to_string().cyan(),
            log.len(),
            config.batch_size
        );
    }

    if args.dry_run {
        let graph = MemoryGraph::new();
        run(&graph, &config, &log, args.json).await?;
        if !args.json {
            println!();
            println!("{}", "Dry run, nothing was written to Neo4j.".yellow());
            output::print_counts(&graph.counts().await?);
        }
    } else {
        let client = GraphClient::connect(&config.neo4j).await?;
        run(&client, &config, &log, args.json).await?;
    }

    Ok(())
}

async fn run(store: &dyn GraphStore, config: &Config, log: &EventLog, json: bool) -> Result<()> {
    let mut pipeline = Pipeline::new(store, config);

    match pipeline.run(log).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            let last = pipeline.last_completed();
            eprintln!(
                "{} {} (last completed: {})",
                "Load failed:".red().bold(),
                e.kind(),
                last.to_string().yellow()
            );
            Err(anyhow::Error::new(e).context(format!("Load stopped after '{}'", last)))
        }
    }
}
