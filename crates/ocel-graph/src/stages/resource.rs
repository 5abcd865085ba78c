//! (:Event)-[:PERFORMED_BY]->(:Resource) upserts.

use async_trait::async_trait;

use ocel_core::{EventLog, OcelResult};

use super::{in_stage, require_id, write_rows, Stage, StageContext, StageReport};
use crate::store::{UpsertKind, UpsertRow};

/// Upserts Resource nodes for events that name one.
pub struct ResourceStage;

impl ResourceStage {
    pub const NAME: &'static str = "resource";

    pub fn rows(log: &EventLog) -> OcelResult<(Vec<UpsertRow>, usize)> {
        let mut rows = Vec::new();
        let mut skipped = 0;

        for (index, event) in log.events.iter().enumerate() {
            let resource = event
                .resource()
                .map_err(|e| in_stage(e, Self::NAME, event, index))?;
            match resource {
                Some(name) => rows.push(UpsertRow::Resource {
                    event_id: require_id(event, index, Self::NAME)?.to_string(),
                    name,
                }),
                None => skipped += 1,
            }
        }

        Ok((rows, skipped))
    }
}

#[async_trait]
impl Stage for ResourceStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let (rows, skipped) = Self::rows(ctx.log)?;
        write_rows(ctx, Self::NAME, UpsertKind::Resource, &rows, skipped).await
    }
}
