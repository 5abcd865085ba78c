//! # OCEL Graph
//!
//! Loads an object-centric event log into a Neo4j property graph.
//!
//! Provides the schema reset, the batched upsert stages, `NEXT_EVENT`
//! derivation per case, and the pipeline that runs them in order.

pub mod batch;
pub mod client;
pub mod memory;
pub mod pipeline;
pub mod schema;
pub mod stages;
pub mod store;

pub use batch::{BatchStats, BatchWriter};
pub use client::GraphClient;
pub use memory::MemoryGraph;
pub use pipeline::{run_pipeline, Pipeline, PipelineReport, PipelineState};
pub use schema::{reset_schema, SchemaStatement, SCHEMA_STATEMENTS};
pub use stages::{Stage, StageContext, StageReport};
pub use store::{CaseEvent, GraphCounts, GraphStore, UpsertKind, UpsertRow};
