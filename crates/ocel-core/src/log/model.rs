//! Event-log domain models.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OcelError, OcelResult};

/// Attribute key holding the case identifier.
pub const CASE_ATTRIBUTE: &str = "case_id";
/// Attribute key holding the resource name.
pub const RESOURCE_ATTRIBUTE: &str = "resource";

/// A parsed object-centric event log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    pub events: Vec<LogEvent>,
}

/// One event as it appears in the log.
///
/// Required fields are kept optional here; each stage decides what it needs
/// and reports a data shape error when it is missing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogEvent {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub activity: Option<String>,
    pub attributes: Map<String, Value>,
    pub objects: Vec<ObjectRef>,
}

/// Reference from an event to an object it involves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    pub id: Option<String>,
    pub object_type: Option<String>,
}

impl EventLog {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of object references across all events.
    pub fn object_ref_count(&self) -> usize {
        self.events.iter().map(|e| e.objects.len()).sum()
    }
}

impl LogEvent {
    /// Label used in error messages: the event id, or the position in the log.
    pub fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("#{}", index),
        }
    }

    /// The case this event belongs to, if any.
    pub fn case_id(&self) -> OcelResult<Option<String>> {
        self.scalar_attribute(CASE_ATTRIBUTE)
    }

    /// The resource that performed this event, if any.
    pub fn resource(&self) -> OcelResult<Option<String>> {
        self.scalar_attribute(RESOURCE_ATTRIBUTE)
    }

    /// Read a scalar attribute as a string. `null` counts as absent.
    pub fn scalar_attribute(&self, key: &str) -> OcelResult<Option<String>> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => scalar_to_string(value).map(Some).ok_or_else(|| {
                OcelError::data_shape(
                    "parse",
                    self.id.clone().unwrap_or_default(),
                    format!("attribute '{}' must be a scalar, got {}", key, value),
                )
            }),
        }
    }
}

/// Stringify a JSON scalar. Arrays and objects yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(attributes: Value) -> LogEvent {
        LogEvent {
            id: Some("e1".to_string()),
            attributes: attributes.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_case_id_variants() {
        assert_eq!(event_with(json!({"case_id": "c1"})).case_id().unwrap(), Some("c1".to_string()));
        assert_eq!(event_with(json!({"case_id": 42})).case_id().unwrap(), Some("42".to_string()));
        assert_eq!(event_with(json!({"case_id": null})).case_id().unwrap(), None);
        assert_eq!(event_with(json!({})).case_id().unwrap(), None);
    }

    #[test]
    fn test_non_scalar_attribute_is_rejected() {
        let err = event_with(json!({"resource": ["a", "b"]})).resource().unwrap_err();
        assert_eq!(err.kind(), "data_shape");
    }

    #[test]
    fn test_label_falls_back_to_index() {
        let event = LogEvent::default();
        assert_eq!(event.label(7), "#7");
        assert_eq!(event_with(json!({})).label(7), "e1");
    }
}
