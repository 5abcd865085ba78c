//! (:Case)-[:CONTAINS_EVENT]->(:Event) upserts.

use async_trait::async_trait;

use ocel_core::{EventLog, OcelResult};

use super::{in_stage, require_id, write_rows, Stage, StageContext, StageReport};
use crate::store::{UpsertKind, UpsertRow};

/// Upserts Case nodes and links them to their events.
pub struct CaseStage;

impl CaseStage {
    pub const NAME: &'static str = "case";

    /// Rows for events carrying a `case_id`, plus the number of events skipped.
    pub fn rows(log: &EventLog) -> OcelResult<(Vec<UpsertRow>, usize)> {
        let mut rows = Vec::new();
        let mut skipped = 0;

        for (index, event) in log.events.iter().enumerate() {
            let case_id = event
                .case_id()
                .map_err(|e| in_stage(e, Self::NAME, event, index))?;
            let Some(case_id) = case_id else {
                skipped += 1;
                continue;
            };
            rows.push(UpsertRow::Case {
                event_id: require_id(event, index, Self::NAME)?.to_string(),
                case_id,
            });
        }

        Ok((rows, skipped))
    }
}

#[async_trait]
impl Stage for CaseStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, ctx: &StageContext<'_>) -> OcelResult<StageReport> {
        let (rows, skipped) = Self::rows(ctx.log)?;
        write_rows(ctx, Self::NAME, UpsertKind::Case, &rows, skipped).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::log_from;
    use serde_json::json;

    #[test]
    fn test_events_without_case_are_skipped() {
        let log = log_from(&[
            ("e1", "2023-01-01T00:00:00Z", "A", json!({"case_id": "c1"})),
            ("e2", "2023-01-01T01:00:00Z", "B", json!({})),
            ("e3", "2023-01-01T02:00:00Z", "C", json!({"case_id": 7})),
        ]);

        let (rows, skipped) = CaseStage::rows(&log).unwrap();

        assert_eq!(skipped, 1);
        assert_eq!(
            rows,
            vec![
                UpsertRow::Case { event_id: "e1".into(), case_id: "c1".into() },
                UpsertRow::Case { event_id: "e3".into(), case_id: "7".into() },
            ]
        );
    }

    #[test]
    fn test_structured_case_id_is_rejected() {
        let log = log_from(&[("e1", "2023-01-01T00:00:00Z", "A", json!({"case_id": {"nested": 1}}))]);
        let err = CaseStage::rows(&log).unwrap_err();
        assert!(err.to_string().contains("stage 'case'"));
    }
}
