//! (:Event)-[:INVOLVES]->(:Object) upserts.

use async_trait::async_trait;

use ocel_core::{EventLog, OcelError, OcelResult};

use super::{require_id, write_rows, Stage, StageContext, StageReport};
use crate::store::{UpsertKind, UpsertRow};

/// Upserts Object nodes, one row per object reference of each event.
pub struct ObjectStage;

impl ObjectStage {
    pub const NAME: &'static str = "object";

    /// Rows for every object reference, plus the number of events with none.
    pub fn rows(log: &EventLog) -> OcelResult<(Vec<UpsertRow>, usize)> {
        let mut rows = Vec::with_capacity(log.object_ref_count());
        let mut skipped = 0;

        for (index, event) in log.events.iter().enumerate() {
            if event.objects.is_empty() {
                skipped += 1;
                continue;
            }
            let event_id = require_id(event, index, Self::NAME)?;

            for (position, obj) in event.objects.iter().enumerate() {
                let (Some(object_id), Some(object_type)) = (&obj.id, &obj.object_type) else {
                    return Err(OcelError::data_shape(
                        Self::NAME,
                        event_id,
                        format!("object reference {} needs both 'id' and 'type'", position),
                    ));
                };
                rows.push(UpsertRow::Object {
                    event_id: event_id.to_string(),
                    object_id: object_id.clone(),
                    object_type: object_type.clone(),
                });
            }
        }

        Ok((rows, skipped))
    }
}

#[async_trait]
impl Stage for ObjectStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let (rows, skipped) = Self::rows(ctx.log)?;
        write_rows(ctx, Self::NAME, UpsertKind::Object, &rows, skipped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocel_core::log::parse_event_log;

    #[test]
    fn test_fans_out_per_reference() {
        let log = parse_event_log(
            r#"{"ocel:events": [
                {"ocel:id": "e1", "ocel:objects": [{"id": "o1", "type": "order"}, {"id": "o2", "type": "order"}]},
                {"ocel:id": "e2"},
                {"ocel:id": "e3", "ocel:objects": [{"id": "o1", "type": "order"}]}
            ]}"#,
        )
        .unwrap();

        let (rows, skipped) = ObjectStage::rows(&log).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(skipped, 1);
        assert_eq!(
            rows[2],
            UpsertRow::Object { event_id: "e3".into(), object_id: "o1".into(), object_type: "order".into() }
        );
    }

    #[test]
    fn test_untyped_reference_is_rejected() {
        let log = parse_event_log(r#"{"ocel:events": [{"ocel:id": "e1", "ocel:omap": ["o1"]}]}"#).unwrap();
        let err = ObjectStage::rows(&log).unwrap_err();
        assert!(err.to_string().contains("'type'"));
    }
}
