//! OCEL JSON parsing.
//!
//! Supports two layouts of `ocel:events`:
//!
//! - a list of events, each with `ocel:id`, `ocel:timestamp`, `ocel:activity`,
//!   `ocel:attributes` and an `ocel:objects` list of `{id, type}` entries
//! - the OCEL 1.0 map keyed by event id, with `ocel:vmap` attributes and an
//!   `ocel:omap` list of object ids whose types live in the root
//!   `ocel:objects` map

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use super::model::{scalar_to_string, EventLog, LogEvent, ObjectRef};
use crate::error::{OcelError, OcelResult};

const STAGE: &str = "parse";

/// Read and parse an event-log file.
pub fn read_event_log(path: &Path) -> OcelResult<EventLog> {
    let raw = std::fs::read_to_string(path)?;
    let log = parse_event_log(&raw)?;
    debug!(path = %path.display(), events = log.len(), "Event log parsed");
    Ok(log)
}

/// Parse an event log from a JSON string.
pub fn parse_event_log(raw: &str) -> OcelResult<EventLog> {
    let root: Value = serde_json::from_str(raw)?;
    let root = root
        .as_object()
        .ok_or_else(|| OcelError::data_shape(STAGE, "root", "event log must be a JSON object"))?;

    let object_types = collect_object_types(root.get("ocel:objects"));

    let events = match root.get("ocel:events") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_event(item, None, index, &object_types))
            .collect::<OcelResult<Vec<_>>>()?,
        Some(Value::Object(items)) => items
            .iter()
            .enumerate()
            .map(|(index, (key, item))| parse_event(item, Some(key), index, &object_types))
            .collect::<OcelResult<Vec<_>>>()?,
        Some(other) => {
            return Err(OcelError::data_shape(
                STAGE,
                "ocel:events",
                format!("expected a list or map of events, got {}", other),
            ))
        }
        None => {
            return Err(OcelError::data_shape(STAGE, "root", "missing 'ocel:events'"));
        }
    };

    Ok(EventLog { events })
}

/// Object id → type from an OCEL 1.0 `ocel:objects` map.
fn collect_object_types(objects: Option<&Value>) -> HashMap<String, String> {
    let mut types = HashMap::new();
    if let Some(Value::Object(map)) = objects {
        for (id, obj) in map {
            if let Some(ty) = obj.get("ocel:type").and_then(scalar_to_string) {
                types.insert(id.clone(), ty);
            }
        }
    }
    types
}

fn parse_event(
    item: &Value,
    key: Option<&String>,
    index: usize,
    object_types: &HashMap<String, String>,
) -> OcelResult<LogEvent> {
    let record = || key.cloned().unwrap_or_else(|| format!("#{}", index));

    let fields = item
        .as_object()
        .ok_or_else(|| OcelError::data_shape(STAGE, record(), "event must be a JSON object"))?;

    let id = match scalar_field(fields, "ocel:id", &record)? {
        Some(id) => Some(id),
        None => key.cloned(),
    };
    let timestamp = scalar_field(fields, "ocel:timestamp", &record)?;
    let activity = scalar_field(fields, "ocel:activity", &record)?;

    let attributes = match fields.get("ocel:attributes").or_else(|| fields.get("ocel:vmap")) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(OcelError::data_shape(
                STAGE,
                record(),
                format!("attributes must be a map, got {}", other),
            ))
        }
    };

    let mut objects = Vec::new();
    for source in [
        fields.get("ocel:objects"),
        fields.get("ocel:omap"),
        attributes.get("objects"),
    ]
    .into_iter()
    .flatten()
    {
        collect_object_refs(source, object_types, &mut objects)
            .map_err(|msg| OcelError::data_shape(STAGE, record(), msg))?;
    }

    Ok(LogEvent {
        id,
        timestamp,
        activity,
        attributes,
        objects,
    })
}

fn scalar_field(
    fields: &Map<String, Value>,
    name: &str,
    record: &dyn Fn() -> String,
) -> OcelResult<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_string(value).map(Some).ok_or_else(|| {
            OcelError::data_shape(STAGE, record(), format!("'{}' must be a scalar", name))
        }),
    }
}

fn collect_object_refs(
    source: &Value,
    object_types: &HashMap<String, String>,
    out: &mut Vec<ObjectRef>,
) -> Result<(), String> {
    let entries = match source {
        Value::Null => return Ok(()),
        Value::Array(entries) => entries,
        other => return Err(format!("object references must be a list, got {}", other)),
    };

    for entry in entries {
        let obj = match entry {
            Value::Object(map) => ObjectRef {
                id: map.get("id").or_else(|| map.get("ocel:id")).and_then(scalar_to_string),
                object_type: map
                    .get("type")
                    .or_else(|| map.get("ocel:type"))
                    .and_then(scalar_to_string),
            },
            scalar => {
                let id = scalar_to_string(scalar)
                    .ok_or_else(|| format!("invalid object reference {}", scalar))?;
                ObjectRef {
                    object_type: object_types.get(&id).cloned(),
                    id: Some(id),
                }
            }
        };
        out.push(obj);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_form() {
        let raw = r#"{
            "ocel:events": [
                {
                    "ocel:id": "e1",
                    "ocel:timestamp": "2023-01-01T10:00:00Z",
                    "ocel:activity": "Create Order",
                    "ocel:attributes": {"case_id": "c1", "resource": "alice"},
                    "ocel:objects": [{"id": "o1", "type": "order"}, {"id": "i1", "type": "item"}]
                },
                {
                    "ocel:id": 2,
                    "ocel:timestamp": "2023-01-01T11:00:00Z",
                    "ocel:activity": "Pay",
                    "ocel:attributes": {}
                }
            ]
        }"#;

        let log = parse_event_log(raw).unwrap();
        assert_eq!(log.len(), 2);
        let first = &log.events[0];
        assert_eq!(first.id.as_deref(), Some("e1"));
        assert_eq!(first.activity.as_deref(), Some("Create Order"));
        assert_eq!(first.case_id().unwrap().as_deref(), Some("c1"));
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.objects[1].object_type.as_deref(), Some("item"));
        assert_eq!(log.events[1].id.as_deref(), Some("2"));
        assert!(log.events[1].objects.is_empty());
        assert_eq!(log.object_ref_count(), 2);
    }

    #[test]
    fn test_ocel_map_form_resolves_object_types() {
        let raw = r#"{
            "ocel:global-log": {},
            "ocel:events": {
                "e7": {
                    "ocel:activity": "Ship",
                    "ocel:timestamp": "2023-02-01T08:00:00",
                    "ocel:omap": ["o1", "o9"],
                    "ocel:vmap": {"resource": "bob"}
                }
            },
            "ocel:objects": {
                "o1": {"ocel:type": "order", "ocel:ovmap": {}}
            }
        }"#;

        let log = parse_event_log(raw).unwrap();
        let event = &log.events[0];
        assert_eq!(event.id.as_deref(), Some("e7"));
        assert_eq!(event.resource().unwrap().as_deref(), Some("bob"));
        assert_eq!(
            event.objects,
            vec![
                ObjectRef { id: Some("o1".into()), object_type: Some("order".into()) },
                ObjectRef { id: Some("o9".into()), object_type: None },
            ]
        );
    }

    #[test]
    fn test_objects_inside_attributes() {
        let raw = r#"{"ocel:events": [{
            "ocel:id": "e1",
            "ocel:timestamp": "2023-01-01T10:00:00Z",
            "ocel:activity": "A",
            "ocel:attributes": {"objects": [{"id": "o1", "type": "order"}]}
        }]}"#;
        let log = parse_event_log(raw).unwrap();
        assert_eq!(log.events[0].objects.len(), 1);
    }

    #[test]
    fn test_missing_fields_are_kept_as_none() {
        let raw = r#"{"ocel:events": [{"ocel:activity": "A"}]}"#;
        let log = parse_event_log(raw).unwrap();
        assert!(log.events[0].id.is_none());
        assert!(log.events[0].timestamp.is_none());
    }

    #[test]
    fn test_missing_events_key() {
        let err = parse_event_log(r#"{"events": []}"#).unwrap_err();
        assert_eq!(err.kind(), "data_shape");
    }

    #[test]
    fn test_non_scalar_id_is_rejected() {
        let err = parse_event_log(r#"{"ocel:events": [{"ocel:id": {"x": 1}}]}"#).unwrap_err();
        assert!(err.to_string().contains("ocel:id"));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_event_log("[1, 2").unwrap_err();
        assert_eq!(err.kind(), "json");
    }
}
