//! (:Event) upserts.

use async_trait::async_trait;

use ocel_core::time::{parse_timestamp, to_cypher_datetime};
use ocel_core::{EventLog, OcelError, OcelResult};

use super::{require_id, write_rows, Stage, StageContext, StageReport};
use crate::store::{UpsertKind, UpsertRow};

/// Upserts one Event node per log event, keyed by id.
pub struct EventStage;

impl EventStage {
    pub const NAME: &'static str = "event";

    /// Rows for every event. Id, timestamp and activity are all required.
    pub fn rows(log: &EventLog) -> OcelResult<Vec<UpsertRow>> {
        log.events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let id = require_id(event, index, Self::NAME)?;
                let raw_ts = event.timestamp.as_deref().ok_or_else(|| {
                    OcelError::data_shape(Self::NAME, id, "missing 'ocel:timestamp'")
                })?;
                let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                    OcelError::data_shape(Self::NAME, id, format!("unparseable timestamp '{}'", raw_ts))
                })?;
                let activity = event.activity.as_deref().ok_or_else(|| {
                    OcelError::data_shape(Self::NAME, id, "missing 'ocel:activity'")
                })?;

                Ok(UpsertRow::Event {
                    id: id.to_string(),
                    timestamp: to_cypher_datetime(&timestamp),
                    activity: activity.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Stage for EventStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let rows = Self::rows(ctx.log)?;
        write_rows(ctx, Self::NAME, UpsertKind::Event, &rows, 0).await
    }
}
