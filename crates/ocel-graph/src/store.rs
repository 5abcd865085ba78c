//! Graph store abstraction shared by the Neo4j client and the in-memory graph.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::BoltType;
use serde::Serialize;

use crate::schema::SchemaStatement;

/// The kinds of batched upsert the loader performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UpsertKind {
    Event,
    Case,
    Activity,
    Resource,
    Object,
    NextEvent,
}

impl UpsertKind {
    /// Cypher template applied to one batch, bound to `$rows`.
    pub fn cypher(&self) -> &'static str {
        match self {
            UpsertKind::Event => {
                "UNWIND $rows AS row
                 MERGE (e:Event {id: row.id})
                 SET e.timestamp = datetime(row.timestamp),
                     e.activity_name = row.activity"
            }
            UpsertKind::Case => {
                "UNWIND $rows AS row
                 MATCH (e:Event {id: row.event_id})
                 MERGE (c:Case {case_id: row.case_id})
                 MERGE (c)-[:CONTAINS_EVENT]->(e)"
            }
            UpsertKind::Activity => {
                "UNWIND $rows AS row
                 MATCH (e:Event {id: row.event_id})
                 MERGE (a:Activity {name: row.name, timestamp: row.timestamp})
                 MERGE (e)-[:OF_TYPE]->(a)"
            }
            UpsertKind::Resource => {
                "UNWIND $rows AS row
                 MATCH (e:Event {id: row.event_id})
                 MERGE (r:Resource {name: row.name})
                 MERGE (e)-[:PERFORMED_BY]->(r)"
            }
            UpsertKind::Object => {
                "UNWIND $rows AS row
                 MATCH (e:Event {id: row.event_id})
                 MERGE (o:Object {id: row.object_id, type: row.object_type})
                 MERGE (e)-[:INVOLVES]->(o)"
            }
            UpsertKind::NextEvent => {
                "UNWIND $rows AS row
                 MATCH (e1:Event {id: row.source}), (e2:Event {id: row.target})
                 MERGE (e1)-[r:NEXT_EVENT]->(e2)
                 SET r.time_difference = row.time_difference"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertKind::Event => "event",
            UpsertKind::Case => "case",
            UpsertKind::Activity => "activity",
            UpsertKind::Resource => "resource",
            UpsertKind::Object => "object",
            UpsertKind::NextEvent => "next_event",
        }
    }
}

impl fmt::Display for UpsertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parameter record of a batched upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UpsertRow {
    Event {
        id: String,
        /// Normalized RFC 3339 string, parsed by `datetime()` on the server.
        timestamp: String,
        activity: String,
    },
    Case {
        event_id: String,
        case_id: String,
    },
    Activity {
        event_id: String,
        name: String,
        timestamp: String,
    },
    Resource {
        event_id: String,
        name: String,
    },
    Object {
        event_id: String,
        object_id: String,
        object_type: String,
    },
    NextEvent {
        source: String,
        target: String,
        time_difference: f64,
    },
}

impl UpsertRow {
    pub fn kind(&self) -> UpsertKind {
        match self {
            UpsertRow::Event { .. } => UpsertKind::Event,
            UpsertRow::Case { .. } => UpsertKind::Case,
            UpsertRow::Activity { .. } => UpsertKind::Activity,
            UpsertRow::Resource { .. } => UpsertKind::Resource,
            UpsertRow::Object { .. } => UpsertKind::Object,
            UpsertRow::NextEvent { .. } => UpsertKind::NextEvent,
        }
    }

    /// Bolt map bound as one element of `$rows`.
    pub fn to_bolt(&self) -> HashMap<String, BoltType> {
        let mut m: HashMap<String, BoltType> = HashMap::new();
        match self {
            UpsertRow::Event { id, timestamp, activity } => {
                m.insert("id".to_string(), id.clone().into());
                m.insert("timestamp".to_string(), timestamp.clone().into());
                m.insert("activity".to_string(), activity.clone().into());
            }
            UpsertRow::Case { event_id, case_id } => {
                m.insert("event_id".to_string(), event_id.clone().into());
                m.insert("case_id".to_string(), case_id.clone().into());
            }
            UpsertRow::Activity { event_id, name, timestamp } => {
                m.insert("event_id".to_string(), event_id.clone().into());
                m.insert("name".to_string(), name.clone().into());
                m.insert("timestamp".to_string(), timestamp.clone().into());
            }
            UpsertRow::Resource { event_id, name } => {
                m.insert("event_id".to_string(), event_id.clone().into());
                m.insert("name".to_string(), name.clone().into());
            }
            UpsertRow::Object { event_id, object_id, object_type } => {
                m.insert("event_id".to_string(), event_id.clone().into());
                m.insert("object_id".to_string(), object_id.clone().into());
                m.insert("object_type".to_string(), object_type.clone().into());
            }
            UpsertRow::NextEvent { source, target, time_difference } => {
                m.insert("source".to_string(), source.clone().into());
                m.insert("target".to_string(), target.clone().into());
                m.insert("time_difference".to_string(), (*time_difference).into());
            }
        }
        m
    }
}

/// An event together with the case that contains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseEvent {
    pub case_id: String,
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Node and relationship counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub relationships_by_type: BTreeMap<String, usize>,
}

impl GraphCounts {
    pub fn label(&self, label: &str) -> usize {
        self.nodes_by_label.get(label).copied().unwrap_or(0)
    }

    pub fn relationship(&self, rel_type: &str) -> usize {
        self.relationships_by_type.get(rel_type).copied().unwrap_or(0)
    }
}

/// Marker for store failures worth retrying (lost connection, timeouts).
#[derive(Debug, thiserror::Error)]
#[error("transient store failure: {0}")]
pub struct TransientError(pub String);

/// Whether a store error is transient and the batch may be retried.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<TransientError>()
            || matches!(
                cause.downcast_ref::<neo4rs::Error>(),
                Some(neo4rs::Error::IOError { .. }) | Some(neo4rs::Error::ConnectionError)
            )
    })
}

/// A graph backend the pipeline can write to.
///
/// Every method is one bounded unit of work. `write_batch` must apply all rows
/// or none of them.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one schema statement.
    async fn apply_schema(&self, statement: &SchemaStatement) -> Result<()>;

    /// Apply one batch of rows of the same kind in a single transaction.
    async fn write_batch(&self, kind: UpsertKind, rows: &[UpsertRow]) -> Result<()>;

    /// All `(Case)-[:CONTAINS_EVENT]->(Event)` pairs with the event timestamp.
    async fn case_events(&self) -> Result<Vec<CaseEvent>>;

    /// Node and relationship counts.
    async fn counts(&self) -> Result<GraphCounts>;
}
