//! Neo4j connection client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{BoltType, ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, warn};

use ocel_core::{GraphConfig, OcelError, OcelResult};

use crate::schema::SchemaStatement;
use crate::store::{CaseEvent, GraphCounts, GraphStore, UpsertKind, UpsertRow};

/// Client for Neo4j graph operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// neo4rs only builds the pool in `Graph::connect`; a `RETURN 1` ping forces
    /// the bolt handshake so an unreachable server fails here.
    pub async fn connect(config: &GraphConfig) -> OcelResult<Self> {
        Self::try_connect(config)
            .await
            .map_err(|e| OcelError::Connection(format!("{} ({:#})", config.uri, e)))
    }

    async fn try_connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .context("Failed to build Neo4j config")?;

        let graph = Graph::connect(neo4j_config)
            .await
            .context("Failed to create Neo4j connection pool")?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("Neo4j is not responding to queries")?;

        debug!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a Cypher query that returns no results.
    pub async fn execute(&self, query: Query) -> Result<()> {
        self.graph.run(query).await.context("Neo4j query execution failed")?;
        Ok(())
    }

    /// Execute a Cypher query and return results as rows.
    pub async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await.context("Neo4j query failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await.context("Failed to read Neo4j result row")? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Read a typed column from a row.
    fn column<T: DeserializeOwned>(row: &neo4rs::Row, field: &str) -> Result<T> {
        row.get(field)
            .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", field, e))
    }

    async fn count_by(&self, cypher: &str, key: &str) -> Result<std::collections::BTreeMap<String, usize>> {
        let mut counts = std::collections::BTreeMap::new();
        for row in self.query(Query::new(cypher.to_string())).await? {
            let name: String = Self::column(&row, key)?;
            let count: i64 = Self::column(&row, "count")?;
            counts.insert(name, count as usize);
        }
        Ok(counts)
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn apply_schema(&self, statement: &SchemaStatement) -> Result<()> {
        self.execute(Query::new(statement.cypher()))
            .await
            .with_context(|| format!("Schema statement '{}' failed", statement.name()))
    }

    async fn write_batch(&self, kind: UpsertKind, rows: &[UpsertRow]) -> Result<()> {
        let params: Vec<HashMap<String, BoltType>> = rows.iter().map(UpsertRow::to_bolt).collect();
        let query = Query::new(kind.cypher().to_string()).param("rows", params);

        let mut txn = self.graph.start_txn().await.context("Failed to start transaction")?;

        match txn.run(query).await {
            Ok(()) => {
                txn.commit().await.context("Failed to commit transaction")?;
                Ok(())
            }
            Err(e) => {
                warn!(kind = %kind, rows = rows.len(), error = %e, "Batch failed, rolling back");
                if let Err(rollback) = txn.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(anyhow::Error::new(e).context(format!("Failed to apply {} batch", kind)))
            }
        }
    }

    async fn case_events(&self) -> Result<Vec<CaseEvent>> {
        let query = Query::new(
            "MATCH (c:Case)-[:CONTAINS_EVENT]->(e:Event)
             RETURN toString(c.case_id) AS case_id,
                    e.id AS event_id,
                    e.timestamp.epochSeconds AS epoch_seconds,
                    e.timestamp.nanosecond AS nanosecond"
                .to_string(),
        );

        let rows = self.query(query).await?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let case_id: String = Self::column(&row, "case_id")?;
            let event_id: String = Self::column(&row, "event_id")?;
            let seconds: i64 = Self::column(&row, "epoch_seconds")?;
            let nanosecond: i64 = Self::column(&row, "nanosecond")?;
            let timestamp = utc_from_epoch(seconds, nanosecond)
                .ok_or_else(|| anyhow::anyhow!("Event '{}' has out-of-range timestamp {}s", event_id, seconds))?;
            events.push(CaseEvent { case_id, event_id, timestamp });
        }
        Ok(events)
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let nodes_by_label = self
            .count_by(
                "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS count",
                "label",
            )
            .await?;
        let relationships_by_type = self
            .count_by(
                "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(*) AS count",
                "rel_type",
            )
            .await?;

        let node_rows = self.query(Query::new("MATCH (n) RETURN count(n) AS count".to_string())).await?;
        let nodes: i64 = match node_rows.first() {
            Some(row) => Self::column(row, "count")?,
            None => 0,
        };

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships_by_type.values().sum(),
            nodes_by_label,
            relationships_by_type,
        })
    }
}

/// Rebuild a UTC instant from Neo4j's `epochSeconds` and `nanosecond` fields.
fn utc_from_epoch(seconds: i64, nanosecond: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, u32::try_from(nanosecond).ok()?)
}
