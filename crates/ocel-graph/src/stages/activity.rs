//! (:Event)-[:OF_TYPE]->(:Activity) upserts.
//!
//! Activity nodes are keyed by `(name, timestamp)`, so one activity label
//! yields a node per distinct event timestamp. The timestamp is the raw log
//! string; events without one fall back to the run's ingestion time.

use async_trait::async_trait;

use ocel_core::{EventLog, OcelError, OcelResult};

use super::{require_id, write_rows, Stage, StageContext, StageReport};
use crate::store::{UpsertKind, UpsertRow};

/// Upserts an Activity node for every event.
pub struct ActivityStage;

impl ActivityStage {
    pub const NAME: &'static str = "activity";

    pub fn rows(log: &EventLog, ingested_at: &str) -> OcelResult<Vec<UpsertRow>> {
        log.events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let event_id = require_id(event, index, Self::NAME)?;
                let name = event.activity.as_deref().ok_or_else(|| {
                    OcelError::data_shape(Self::NAME, event_id, "missing 'ocel:activity'")
                })?;

                Ok(UpsertRow::Activity {
                    event_id: event_id.to_string(),
                    name: name.to_string(),
                    timestamp: event.timestamp.as_deref().unwrap_or(ingested_at).to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Stage for ActivityStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let rows = Self::rows(ctx.log, ctx.ingested_at)?;
        write_rows(ctx, Self::NAME, UpsertKind::Activity, &rows, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::log_from;
    use ocel_core::log::parse_event_log;
    use serde_json::json;

    #[test]
    fn test_keyed_by_raw_timestamp() {
        let log = log_from(&[
            ("e1", "2023-01-01T00:00:00Z", "Pay", json!({})),
            ("e2", "2023-01-02T00:00:00Z", "Pay", json!({})),
        ]);

        let rows = ActivityStage::rows(&log, "unused").unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            UpsertRow::Activity {
                event_id: "e2".into(),
                name: "Pay".into(),
                timestamp: "2023-01-02T00:00:00Z".into(),
            }
        );
    }

    #[test]
    fn test_missing_timestamp_uses_ingestion_time() {
        let log = parse_event_log(r#"{"ocel:events": [{"ocel:id": "e1", "ocel:activity": "Pay"}]}"#).unwrap();

        let rows = ActivityStage::rows(&log, "2024-06-01T09:30:00.000000Z").unwrap();

        assert!(matches!(
            &rows[0],
            UpsertRow::Activity { timestamp, .. } if timestamp == "2024-06-01T09:30:00.000000Z"
        ));
    }

    #[test]
    fn test_missing_activity_is_rejected() {
        let log = parse_event_log(r#"{"ocel:events": [{"ocel:id": "e1"}]}"#).unwrap();
        assert!(ActivityStage::rows(&log, "now").is_err());
    }
}
