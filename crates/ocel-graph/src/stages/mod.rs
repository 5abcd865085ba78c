//! Ingestion stages.
//!
//! Each stage scans the event log once, builds its upsert rows and writes them
//! through the shared [`BatchWriter`]:
//!
//! - (:Event)
//! - (:Case)-[:CONTAINS_EVENT]->(:Event)
//! - (:Event)-[:OF_TYPE]->(:Activity)
//! - (:Event)-[:PERFORMED_BY]->(:Resource)
//! - (:Event)-[:INVOLVES]->(:Object)
//! - (:Event)-[:NEXT_EVENT]->(:Event), derived from the graph itself

pub mod activity;
pub mod case;
pub mod event;
pub mod object;
pub mod resource;
pub mod sequence;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use ocel_core::{EventLog, LogEvent, OcelError, OcelResult};

use crate::batch::BatchWriter;
use crate::store::{GraphStore, UpsertKind, UpsertRow};

pub use activity::ActivityStage;
pub use case::CaseStage;
pub use event::EventStage;
pub use object::ObjectStage;
pub use resource::ResourceStage;
pub use sequence::SequenceStage;

/// Everything a stage needs to run.
pub struct StageContext<'a> {
    pub store: &'a dyn GraphStore,
    pub log: &'a EventLog,
    pub writer: &'a BatchWriter,
    /// Wall-clock time of this run, used when an event has no timestamp.
    pub ingested_at: &'a str,
}

/// What a stage did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows: usize,
    pub batches: usize,
    pub retries: u32,
    /// Events that did not carry the attribute this stage loads.
    pub skipped: usize,
    pub elapsed: Duration,
}

/// One step of the ingestion pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport>;
}

/// Write `rows` of `kind` and build the stage report.
pub(crate) async fn write_rows(
    ctx: &StageContext<'_>,
    stage: &'static str,
    kind: UpsertKind,
    rows: &[UpsertRow],
    skipped: usize,
) -> OcelResult<StageReport> {
    let stats = ctx.writer.write(ctx.store, stage, kind, rows).await?;
    Ok(StageReport {
        stage,
        rows: stats.rows,
        batches: stats.batches,
        retries: stats.retries,
        skipped,
        elapsed: Duration::ZERO,
    })
}

/// The event id, or a data shape error naming the stage and log position.
pub(crate) fn require_id<'e>(event: &'e LogEvent, index: usize, stage: &str) -> OcelResult<&'e str> {
    event
        .id
        .as_deref()
        .ok_or_else(|| OcelError::data_shape(stage, event.label(index), "missing 'ocel:id'"))
}

/// Attach the stage name to an attribute error raised while reading the log.
pub(crate) fn in_stage(err: OcelError, stage: &str, event: &LogEvent, index: usize) -> OcelError {
    match err {
        OcelError::DataShape { message, .. } => OcelError::data_shape(stage, event.label(index), message),
        other => other,
    }
}
