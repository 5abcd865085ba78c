//! Event log to graph ingestion pipeline.
//!
//! Runs schema reset → events → {case, activity, resource, object} →
//! sequence. The four edge stages only need Event nodes and may run
//! concurrently; the sequence stage waits for all of them.

use std::fmt;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, info_span, Instrument};

use ocel_core::time::now_iso8601;
use ocel_core::{Config, EventLog, OcelResult};

use crate::batch::BatchWriter;
use crate::schema::reset_schema;
use crate::stages::{
    ActivityStage, CaseStage, EventStage, ObjectStage, ResourceStage, SequenceStage, Stage,
    StageContext, StageReport,
};
use crate::store::GraphStore;

/// Where the pipeline is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Pending,
    SchemaReady,
    EventsLoaded,
    EdgesLoaded,
    SequenceDerived,
    Succeeded,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::SchemaReady => "schema_ready",
            Self::EventsLoaded => "events_loaded",
            Self::EdgesLoaded => "edges_loaded",
            Self::SequenceDerived => "sequence_derived",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub events: usize,
    pub schema_statements: usize,
    pub stages: Vec<StageReport>,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn total_rows(&self) -> usize {
        self.stages.iter().map(|s| s.rows).sum()
    }
}

/// Orchestrates one load of an event log into a graph store.
pub struct Pipeline<'a> {
    store: &'a dyn GraphStore,
    writer: BatchWriter,
    parallel_stages: bool,
    ingested_at: String,
    state: PipelineState,
    last_completed: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn GraphStore, config: &Config) -> Self {
        Self {
            store,
            writer: BatchWriter::new(config.batch_size, config.retry.clone()),
            parallel_stages: config.parallel_stages,
            ingested_at: now_iso8601(),
            state: PipelineState::Pending,
            last_completed: PipelineState::Pending,
        }
    }

    /// Fix the time substituted for events without a timestamp.
    pub fn with_ingested_at(mut self, ingested_at: impl Into<String>) -> Self {
        self.ingested_at = ingested_at.into();
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The last state reached before a failure (or the current one).
    pub fn last_completed(&self) -> PipelineState {
        self.last_completed
    }

    fn advance(&mut self, state: PipelineState) {
        self.state = state;
        self.last_completed = state;
    }

    /// Run every stage in order. The first error stops the run.
    pub async fn run(&mut self, log: &EventLog) -> OcelResult<PipelineReport> {
        if self.state != PipelineState::Pending {
            self.state = PipelineState::Pending;
            self.last_completed = PipelineState::Pending;
        }

        let started = Instant::now();
        info!(events = log.len(), batch_size = self.writer.batch_size(), "Starting full data upload process...");

        match self.run_stages(log).await {
            Ok((schema_statements, stages)) => {
                self.advance(PipelineState::Succeeded);
                let elapsed = started.elapsed();
                info!(elapsed_secs = elapsed.as_secs_f64(), "All data successfully uploaded");
                Ok(PipelineReport {
                    events: log.len(),
                    schema_statements,
                    stages,
                    elapsed,
                })
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                error!(
                    last_completed = %self.last_completed,
                    kind = e.kind(),
                    error = %e,
                    "Pipeline failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, log: &EventLog) -> OcelResult<(usize, Vec<StageReport>)> {
        let schema_statements = timed("schema", reset_schema(self.store)).await?;
        self.advance(PipelineState::SchemaReady);

        let writer = self.writer.clone();
        let ingested_at = self.ingested_at.clone();
        let ctx = StageContext {
            store: self.store,
            log,
            writer: &writer,
            ingested_at: &ingested_at,
        };

        let mut reports = Vec::with_capacity(6);

        reports.push(run_stage(&EventStage, &ctx).await?);
        self.advance(PipelineState::EventsLoaded);

        let edge_stages: [&dyn Stage; 4] = [&CaseStage, &ActivityStage, &ResourceStage, &ObjectStage];
        if self.parallel_stages {
            // Every stage runs to completion so each open transaction is
            // committed or rolled back; the first failure in stage order wins.
            let results = join_all(edge_stages.iter().map(|stage| run_stage(*stage, &ctx))).await;
            for result in results {
                reports.push(result?);
            }
        } else {
            for stage in edge_stages {
                reports.push(run_stage(stage, &ctx).await?);
            }
        }
        self.advance(PipelineState::EdgesLoaded);

        reports.push(run_stage(&SequenceStage, &ctx).await?);
        self.advance(PipelineState::SequenceDerived);

        Ok((schema_statements, reports))
    }
}

/// Run one stage with start/completion logging.
async fn run_stage(stage: &dyn Stage, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
    let started = Instant::now();
    let mut report = timed(stage.name(), stage.run(ctx)).await?;
    report.elapsed = started.elapsed();
    info!(
        stage = stage.name(),
        rows = report.rows,
        batches = report.batches,
        skipped = report.skipped,
        "Stage summary"
    );
    Ok(report)
}

async fn timed<T>(name: &'static str, fut: impl std::future::Future<Output = OcelResult<T>>) -> OcelResult<T> {
    let span = info_span!("stage", name);
    async move {
        info!("Starting: {}...", name);
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => info!(elapsed_secs = elapsed, "{} completed in {:.2} seconds.", name, elapsed),
            Err(e) => error!(elapsed_secs = elapsed, error = %e, "{} failed after {:.2} seconds.", name, elapsed),
        }
        result
    }
    .instrument(span)
    .await
}

/// Reset the schema and load `log` into `store`.
pub async fn run_pipeline(store: &dyn GraphStore, config: &Config, log: &EventLog) -> OcelResult<PipelineReport> {
    Pipeline::new(store, config).run(log).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::stages::test_support::log_from;
    use crate::store::UpsertKind;
    use ocel_core::OcelError;
    use serde_json::json;

    fn config() -> Config {
        let mut config = Config::with_data_file("unused.json");
        config.batch_size = 2;
        config
    }

    #[tokio::test]
    async fn test_states_advance_to_succeeded() {
        let graph = MemoryGraph::new();
        let log = log_from(&[("e1", "2023-01-01T00:00:00Z", "A", json!({"case_id": "c1"}))]);
        let mut pipeline = Pipeline::new(&graph, &config());

        assert_eq!(pipeline.state(), PipelineState::Pending);
        let report = pipeline.run(&log).await.unwrap();

        assert_eq!(pipeline.state(), PipelineState::Succeeded);
        assert_eq!(report.schema_statements, 6);
        let names: Vec<&str> = report.stages.iter().map(|s| s.stage).collect();
        assert_eq!(names, vec!["event", "case", "activity", "resource", "object", "sequence"]);
    }

    #[tokio::test]
    async fn test_schema_failure_stops_before_data() {
        let graph = MemoryGraph::new();
        graph.fail_schema("case_unique");
        let log = log_from(&[("e1", "2023-01-01T00:00:00Z", "A", json!({}))]);
        let mut pipeline = Pipeline::new(&graph, &config());

        let err = pipeline.run(&log).await.unwrap_err();

        assert!(matches!(err, OcelError::Schema { .. }));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert_eq!(pipeline.last_completed(), PipelineState::Pending);
        assert!(graph.batch_log().is_empty());
    }

    #[tokio::test]
    async fn test_edge_stage_failure_skips_sequence() {
        let graph = MemoryGraph::new();
        graph.fail_batches(UpsertKind::Resource, 0, 1, false);
        let log = log_from(&[
            ("e1", "2023-01-01T00:00:00Z", "A", json!({"case_id": "c1", "resource": "r"})),
            ("e2", "2023-01-01T00:01:00Z", "B", json!({"case_id": "c1"})),
        ]);
        let mut config = config();
        config.parallel_stages = false;
        let mut pipeline = Pipeline::new(&graph, &config);

        let err = pipeline.run(&log).await.unwrap_err();

        assert!(matches!(err, OcelError::BatchWrite { ref stage, .. } if stage == "resource"));
        assert_eq!(pipeline.last_completed(), PipelineState::EventsLoaded);
        assert!(graph.next_event_edges().is_empty());
        assert!(!graph.batch_log().iter().any(|(kind, _)| *kind == UpsertKind::NextEvent));
    }

    #[tokio::test]
    async fn test_parallel_failure_lets_sibling_stages_finish() {
        let graph = MemoryGraph::new();
        graph.fail_batches(UpsertKind::Resource, 0, 1, false);
        let log = ocel_core::log::parse_event_log(
            &json!({"ocel:events": [{
                "ocel:id": "e1",
                "ocel:timestamp": "2023-01-01T00:00:00Z",
                "ocel:activity": "A",
                "ocel:attributes": {"case_id": "c1", "resource": "r"},
                "ocel:objects": [{"id": "o1", "type": "order"}]
            }]})
            .to_string(),
        )
        .unwrap();
        let mut pipeline = Pipeline::new(&graph, &config());

        let err = pipeline.run(&log).await.unwrap_err();

        assert!(matches!(err, OcelError::BatchWrite { ref stage, .. } if stage == "resource"));
        assert_eq!(pipeline.last_completed(), PipelineState::EventsLoaded);
        let written: Vec<UpsertKind> = graph.batch_log().into_iter().map(|(kind, _)| kind).collect();
        assert!(written.contains(&UpsertKind::Object), "object stage ran after resource failed");
        assert!(written.contains(&UpsertKind::Case));
        assert!(!written.contains(&UpsertKind::NextEvent));
    }

    #[tokio::test]
    async fn test_data_shape_failure_in_event_stage() {
        let graph = MemoryGraph::new();
        let log = ocel_core::log::parse_event_log(
            r#"{"ocel:events": [{"ocel:id": "e1", "ocel:activity": "A"}]}"#,
        )
        .unwrap();
        let mut pipeline = Pipeline::new(&graph, &config());

        let err = pipeline.run(&log).await.unwrap_err();

        assert_eq!(err.kind(), "data_shape");
        assert_eq!(pipeline.last_completed(), PipelineState::SchemaReady);
        assert_eq!(graph.counts().await.unwrap().nodes, 0);
    }

    #[tokio::test]
    async fn test_sequential_and_parallel_agree() {
        let log = log_from(&[
            ("e1", "2023-01-01T00:00:00Z", "A", json!({"case_id": "c1", "resource": "r1"})),
            ("e2", "2023-01-01T00:05:00Z", "B", json!({"case_id": "c1", "resource": "r2"})),
            ("e3", "2023-01-01T00:07:00Z", "C", json!({"case_id": "c2"})),
        ]);

        let parallel = MemoryGraph::new();
        run_pipeline(&parallel, &config(), &log).await.unwrap();

        let sequential = MemoryGraph::new();
        let mut cfg = config();
        cfg.parallel_stages = false;
        run_pipeline(&sequential, &cfg, &log).await.unwrap();

        assert_eq!(parallel.counts().await.unwrap(), sequential.counts().await.unwrap());
        assert_eq!(parallel.next_event_edges(), sequential.next_event_edges());
    }
}
