//! In-memory graph store.
//!
//! Mirrors the MERGE/MATCH semantics of the Cypher templates in
//! [`UpsertKind::cypher`] so a load can be dry-run without Neo4j and the
//! pipeline can be tested end to end. Failures can be injected per upsert
//! kind or schema statement.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use ocel_core::time::parse_timestamp;

use crate::schema::SchemaStatement;
use crate::store::{CaseEvent, GraphCounts, GraphStore, TransientError, UpsertKind, UpsertRow};

/// An Event node.
#[derive(Debug, Clone, PartialEq)]
pub struct EventNode {
    pub timestamp: DateTime<FixedOffset>,
    pub activity_name: String,
}

#[derive(Debug, Clone)]
struct FailurePlan {
    kind: UpsertKind,
    succeed_first: usize,
    failures_left: usize,
    transient: bool,
}

#[derive(Debug, Default)]
struct Inner {
    events: BTreeMap<String, EventNode>,
    cases: BTreeSet<String>,
    activities: BTreeSet<(String, String)>,
    resources: BTreeSet<String>,
    objects: BTreeSet<(String, String)>,
    contains_event: BTreeSet<(String, String)>,
    of_type: BTreeSet<(String, (String, String))>,
    performed_by: BTreeSet<(String, String)>,
    involves: BTreeSet<(String, (String, String))>,
    next_event: BTreeMap<(String, String), f64>,
    constraints: BTreeSet<&'static str>,
    indexes: BTreeSet<&'static str>,
    schema_log: Vec<String>,
    batch_log: Vec<(UpsertKind, usize)>,
    failure: Option<FailurePlan>,
    failing_schema: Option<&'static str>,
}

/// Graph store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: Mutex<Inner>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain collections behind, still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail `failures` batches of `kind` after letting `succeed_first` through.
    pub fn fail_batches(&self, kind: UpsertKind, succeed_first: usize, failures: usize, transient: bool) {
        self.lock().failure = Some(FailurePlan {
            kind,
            succeed_first,
            failures_left: failures,
            transient,
        });
    }

    /// Make every schema statement touching `name` fail.
    pub fn fail_schema(&self, name: &'static str) {
        self.lock().failing_schema = Some(name);
    }

    pub fn event(&self, id: &str) -> Option<EventNode> {
        self.lock().events.get(id).cloned()
    }

    /// `NEXT_EVENT` edges as `(source, target, time_difference)`.
    pub fn next_event_edges(&self) -> Vec<(String, String, f64)> {
        self.lock()
            .next_event
            .iter()
            .map(|((source, target), diff)| (source.clone(), target.clone(), *diff))
            .collect()
    }

    /// Ids of the events a case contains.
    pub fn case_members(&self, case_id: &str) -> Vec<String> {
        self.lock()
            .contains_event
            .iter()
            .filter(|(case, _)| case == case_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// `(name, timestamp)` keys of all Activity nodes.
    pub fn activity_keys(&self) -> Vec<(String, String)> {
        self.lock().activities.iter().cloned().collect()
    }

    pub fn constraints(&self) -> Vec<&'static str> {
        self.lock().constraints.iter().copied().collect()
    }

    pub fn indexes(&self) -> Vec<&'static str> {
        self.lock().indexes.iter().copied().collect()
    }

    /// Cypher of every schema statement applied, in order.
    pub fn schema_log(&self) -> Vec<String> {
        self.lock().schema_log.clone()
    }

    /// Kind and row count of every committed batch, in order.
    pub fn batch_log(&self) -> Vec<(UpsertKind, usize)> {
        self.lock().batch_log.clone()
    }
}

impl Inner {
    fn check_failure(&mut self, kind: UpsertKind) -> Result<()> {
        let Some(plan) = self.failure.as_mut().filter(|p| p.kind == kind) else {
            return Ok(());
        };
        if plan.succeed_first > 0 {
            plan.succeed_first -= 1;
            return Ok(());
        }
        if plan.failures_left == 0 {
            return Ok(());
        }
        plan.failures_left -= 1;
        if plan.transient {
            Err(TransientError(format!("injected failure on {} batch", kind)).into())
        } else {
            bail!("injected failure on {} batch", kind)
        }
    }

    fn apply(&mut self, row: &UpsertRow, parsed_ts: Option<DateTime<FixedOffset>>) {
        match row {
            UpsertRow::Event { id, activity, .. } => {
                if let Some(timestamp) = parsed_ts {
                    self.events.insert(
                        id.clone(),
                        EventNode {
                            timestamp,
                            activity_name: activity.clone(),
                        },
                    );
                }
            }
            UpsertRow::Case { event_id, case_id } => {
                if self.events.contains_key(event_id) {
                    self.cases.insert(case_id.clone());
                    self.contains_event.insert((case_id.clone(), event_id.clone()));
                }
            }
            UpsertRow::Activity { event_id, name, timestamp } => {
                if self.events.contains_key(event_id) {
                    let key = (name.clone(), timestamp.clone());
                    self.activities.insert(key.clone());
                    self.of_type.insert((event_id.clone(), key));
                }
            }
            UpsertRow::Resource { event_id, name } => {
                if self.events.contains_key(event_id) {
                    self.resources.insert(name.clone());
                    self.performed_by.insert((event_id.clone(), name.clone()));
                }
            }
            UpsertRow::Object { event_id, object_id, object_type } => {
                if self.events.contains_key(event_id) {
                    let key = (object_id.clone(), object_type.clone());
                    self.objects.insert(key.clone());
                    self.involves.insert((event_id.clone(), key));
                }
            }
            UpsertRow::NextEvent { source, target, time_difference } => {
                if self.events.contains_key(source) && self.events.contains_key(target) {
                    self.next_event.insert((source.clone(), target.clone()), *time_difference);
                }
            }
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn apply_schema(&self, statement: &SchemaStatement) -> Result<()> {
        let mut inner = self.lock();
        if inner.failing_schema == Some(statement.name()) {
            bail!("injected failure on schema statement '{}'", statement.name());
        }

        match statement {
            SchemaStatement::DropConstraint { name } => {
                inner.constraints.remove(name);
            }
            SchemaStatement::DropIndex { name } => {
                inner.indexes.remove(name);
            }
            SchemaStatement::CreateUniqueConstraint { name, .. } => {
                inner.constraints.insert(*name);
            }
            SchemaStatement::CreateIndex { name, .. } => {
                inner.indexes.insert(*name);
            }
        }
        inner.schema_log.push(statement.cypher());
        Ok(())
    }

    async fn write_batch(&self, kind: UpsertKind, rows: &[UpsertRow]) -> Result<()> {
        let mut inner = self.lock();
        inner.check_failure(kind)?;

        // Validate the whole batch before touching state so a failure leaves nothing behind.
        let mut parsed = Vec::with_capacity(rows.len());
        for row in rows {
            if row.kind() != kind {
                bail!("{} row in a {} batch", row.kind(), kind);
            }
            let ts = match row {
                UpsertRow::Event { id, timestamp, .. } => Some(
                    parse_timestamp(timestamp)
                        .ok_or_else(|| anyhow::anyhow!("Event '{}': invalid datetime '{}'", id, timestamp))?,
                ),
                _ => None,
            };
            parsed.push(ts);
        }

        for (row, ts) in rows.iter().zip(parsed) {
            inner.apply(row, ts);
        }
        inner.batch_log.push((kind, rows.len()));
        Ok(())
    }

    async fn case_events(&self) -> Result<Vec<CaseEvent>> {
        let inner = self.lock();
        Ok(inner
            .contains_event
            .iter()
            .filter_map(|(case_id, event_id)| {
                inner.events.get(event_id).map(|event| CaseEvent {
                    case_id: case_id.clone(),
                    event_id: event_id.clone(),
                    timestamp: event.timestamp.with_timezone(&Utc),
                })
            })
            .collect())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let inner = self.lock();
        let mut counts = GraphCounts::default();

        for (label, n) in [
            ("Event", inner.events.len()),
            ("Case", inner.cases.len()),
            ("Activity", inner.activities.len()),
            ("Resource", inner.resources.len()),
            ("Object", inner.objects.len()),
        ] {
            if n > 0 {
                counts.nodes_by_label.insert(label.to_string(), n);
            }
            counts.nodes += n;
        }

        for (rel_type, n) in [
            ("CONTAINS_EVENT", inner.contains_event.len()),
            ("OF_TYPE", inner.of_type.len()),
            ("PERFORMED_BY", inner.performed_by.len()),
            ("INVOLVES", inner.involves.len()),
            ("NEXT_EVENT", inner.next_event.len()),
        ] {
            if n > 0 {
                counts.relationships_by_type.insert(rel_type.to_string(), n);
            }
            counts.relationships += n;
        }

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::is_transient;

    fn event_row(id: &str, ts: &str) -> UpsertRow {
        UpsertRow::Event {
            id: id.to_string(),
            timestamp: ts.to_string(),
            activity: "A".to_string(),
        }
    }

    #[tokio::test]
    async fn test_event_merge_overwrites() {
        let graph = MemoryGraph::new();
        graph.write_batch(UpsertKind::Event, &[event_row("e1", "2023-01-01T00:00:00Z")]).await.unwrap();
        graph
            .write_batch(
                UpsertKind::Event,
                &[UpsertRow::Event {
                    id: "e1".into(),
                    timestamp: "2023-01-02T00:00:00Z".into(),
                    activity: "B".into(),
                }],
            )
            .await
            .unwrap();

        let counts = graph.counts().await.unwrap();
        assert_eq!(counts.label("Event"), 1);
        assert_eq!(graph.event("e1").unwrap().activity_name, "B");
    }

    #[tokio::test]
    async fn test_match_on_missing_event_is_noop() {
        let graph = MemoryGraph::new();
        graph
            .write_batch(
                UpsertKind::Case,
                &[UpsertRow::Case { event_id: "ghost".into(), case_id: "c1".into() }],
            )
            .await
            .unwrap();
        assert_eq!(graph.counts().await.unwrap(), GraphCounts::default());
    }

    #[tokio::test]
    async fn test_invalid_timestamp_rejects_whole_batch() {
        let graph = MemoryGraph::new();
        let err = graph
            .write_batch(
                UpsertKind::Event,
                &[event_row("e1", "2023-01-01T00:00:00Z"), event_row("e2", "not a date")],
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("e2"));
        assert!(graph.event("e1").is_none());
        assert!(graph.batch_log().is_empty());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let graph = MemoryGraph::new();
        graph.fail_batches(UpsertKind::Event, 1, 1, true);

        let rows = [event_row("e1", "2023-01-01T00:00:00Z")];
        graph.write_batch(UpsertKind::Event, &rows).await.unwrap();
        let err = graph.write_batch(UpsertKind::Event, &rows).await.unwrap_err();
        assert!(is_transient(&err));
        graph.write_batch(UpsertKind::Event, &rows).await.unwrap();
        assert_eq!(graph.batch_log().len(), 2);
    }

    #[tokio::test]
    async fn test_schema_statements_tracked() {
        let graph = MemoryGraph::new();
        for statement in crate::schema::SCHEMA_STATEMENTS {
            graph.apply_schema(statement).await.unwrap();
        }
        assert_eq!(graph.constraints(), vec!["case_unique", "event_id_unique"]);
        assert_eq!(graph.indexes(), vec!["activity_name"]);
        assert_eq!(graph.schema_log().len(), 6);
    }
}
