//! `ocelgraph schema`: drop and recreate the loader's constraints and indexes.

use anyhow::Result;
use colored::Colorize;

use ocel_core::Config;
use ocel_graph::{reset_schema, GraphClient, SCHEMA_STATEMENTS};

pub async fn execute(config: &Config) -> Result<()> {
    let client = GraphClient::connect(&config.neo4j).await?;

    println!("{}", "Resetting schema...".bold());
    let applied = reset_schema(&client).await?;

    for statement in SCHEMA_STATEMENTS.iter().take(applied) {
        println!("  {} {}", "✓".green(), statement);
    }
    println!("\n{} {} statements applied", "Done:".green().bold(), applied);
    Ok(())
}
