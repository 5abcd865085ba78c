//! `ocelgraph status`: show what is currently in the graph.

use anyhow::Result;
use colored::Colorize;

use ocel_core::Config;
use ocel_graph::{GraphClient, GraphStore};

use crate::output;

pub async fn execute(config: &Config) -> Result<()> {
    let client = GraphClient::connect(&config.neo4j).await?;
    let counts = client.counts().await?;

    println!("{} {}", "Neo4j:".bold(), config.neo4j.uri.cyan());
    println!("{} {}", "Database:".bold(), config.neo4j.database);
    output::print_counts(&counts);
    Ok(())
}
