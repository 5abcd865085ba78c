//! (:Event)-[:NEXT_EVENT]->(:Event) derivation.
//!
//! Reads the Case → Event structure back from the store, orders every case's
//! events by `(timestamp, id)` and links each event to its successor. Adjacent
//! events with the same timestamp are not linked, which leaves a gap in that
//! case's chain.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use ocel_core::{OcelError, OcelResult};

use super::{write_rows, Stage, StageContext, StageReport};
use crate::store::{CaseEvent, UpsertKind, UpsertRow};

/// A derived `NEXT_EVENT` edge.
#[derive(Debug, Clone, PartialEq)]
pub struct NextEventEdge {
    pub case_id: String,
    pub source: String,
    pub target: String,
    /// Seconds between the two events, never negative.
    pub time_difference: f64,
}

impl NextEventEdge {
    pub fn to_row(&self) -> UpsertRow {
        UpsertRow::NextEvent {
            source: self.source.clone(),
            target: self.target.clone(),
            time_difference: self.time_difference,
        }
    }
}

/// Result of deriving edges for all cases.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    pub edges: Vec<NextEventEdge>,
    /// Adjacent pairs left unlinked because their timestamps are equal.
    pub tied_pairs: usize,
}

/// Derive `NEXT_EVENT` edges from `(case, event, timestamp)` triples.
pub fn derive_next_events(case_events: Vec<CaseEvent>) -> Derivation {
    let mut by_case: BTreeMap<String, Vec<(DateTime<Utc>, String)>> = BTreeMap::new();
    for ce in case_events {
        by_case.entry(ce.case_id).or_default().push((ce.timestamp, ce.event_id));
    }

    let mut derivation = Derivation::default();
    for (case_id, mut events) in by_case {
        events.sort();

        for pair in events.windows(2) {
            let (ts1, e1) = &pair[0];
            let (ts2, e2) = &pair[1];
            if e1 == e2 {
                continue;
            }
            if ts1 >= ts2 {
                derivation.tied_pairs += 1;
                debug!(case_id = %case_id, source = %e1, target = %e2, "Equal timestamps, no NEXT_EVENT");
                continue;
            }
            derivation.edges.push(NextEventEdge {
                case_id: case_id.clone(),
                source: e1.clone(),
                target: e2.clone(),
                time_difference: seconds_between(ts1, ts2),
            });
        }
    }

    derivation
}

/// Elapsed seconds from `from` to `to`, at nanosecond precision.
fn seconds_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> f64 {
    let delta = *to - *from;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        // Beyond ~292 years nanoseconds overflow i64.
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Links consecutive events of every case.
pub struct SequenceStage;

impl SequenceStage {
    pub const NAME: &'static str = "sequence";
}

#[async_trait]
impl Stage for SequenceStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let case_events = ctx.store.case_events().await.map_err(|e| OcelError::Query {
            stage: Self::NAME.to_string(),
            message: format!("reading case events: {:#}", e),
        })?;

        let derivation = derive_next_events(case_events);
        let rows: Vec<UpsertRow> = derivation.edges.iter().map(NextEventEdge::to_row).collect();
        write_rows(ctx, Self::NAME, UpsertKind::NextEvent, &rows, derivation.tied_pairs).await
    }
}
