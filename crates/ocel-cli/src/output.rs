//! Terminal output formatting.

use colored::Colorize;

use ocel_graph::{GraphCounts, PipelineReport};

/// Print a pipeline run report as a per-stage table.
pub fn print_report(report: &PipelineReport) {
    println!();
    println!(
        "{:<10} {:>10} {:>8} {:>8} {:>8} {:>10}",
        "Stage", "Rows", "Batches", "Retries", "Skipped", "Seconds"
    );
    println!("{}", "─".repeat(59));

    for stage in &report.stages {
        let skipped = if stage.skipped > 0 {
            stage.skipped.to_string().yellow()
        } else {
            stage.skipped.to_string().dimmed()
        };
        println!(
            "{:<10} {:>10} {:>8} {:>8} {:>8} {:>10.2}",
            stage.stage,
            stage.rows,
            stage.batches,
            stage.retries,
            skipped,
            stage.elapsed.as_secs_f64()
        );
    }

    println!();
    println!(
        "{} {} events, {} rows written, {} schema statements in {:.2}s",
        "Loaded:".green().bold(),
        report.events,
        report.total_rows(),
        report.schema_statements,
        report.elapsed.as_secs_f64()
    );
}

/// Print node counts per label and relationship counts per type.
pub fn print_counts(counts: &GraphCounts) {
    println!();
    println!("{} ({})", "Nodes".bold(), counts.nodes);
    if counts.nodes_by_label.is_empty() {
        println!("  {}", "No nodes found.".dimmed());
    }
    for (label, count) in &counts.nodes_by_label {
        println!("  {:<16} {:>10}", label.cyan(), count);
    }

    println!();
    println!("{} ({})", "Relationships".bold(), counts.relationships);
    if counts.relationships_by_type.is_empty() {
        println!("  {}", "No relationships found.".dimmed());
    }
    for (rel_type, count) in &counts.relationships_by_type {
        println!("  {:<16} {:>10}", rel_type.cyan(), count);
    }
}
