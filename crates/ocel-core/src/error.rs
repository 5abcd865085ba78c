//! Centralized error types for the OCEL graph loader.

use thiserror::Error;

/// Main error type for loader operations.
#[derive(Error, Debug)]
pub enum OcelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Schema error on '{statement}': {message}")]
    Schema { statement: String, message: String },

    #[error("Batch write failed in stage '{stage}' at batch {batch_index} after {attempts} attempt(s): {message}")]
    BatchWrite {
        stage: String,
        batch_index: usize,
        attempts: u32,
        message: String,
    },

    #[error("Graph query failed in stage '{stage}': {message}")]
    Query { stage: String, message: String },

    #[error("Invalid event data in stage '{stage}' (record {record}): {message}")]
    DataShape {
        stage: String,
        record: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for loader operations.
pub type OcelResult<T> = Result<T, OcelError>;

impl OcelError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a data shape error for a record processed by `stage`.
    pub fn data_shape(
        stage: impl Into<String>,
        record: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::DataShape {
            stage: stage.into(),
            record: record.into(),
            message: msg.into(),
        }
    }

    /// Short name of the error category, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Connection(_) => "connection",
            Self::Schema { .. } => "schema",
            Self::BatchWrite { .. } => "batch_write",
            Self::Query { .. } => "query",
            Self::DataShape { .. } => "data_shape",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_write_message_names_stage_and_batch() {
        let err = OcelError::BatchWrite {
            stage: "case".to_string(),
            batch_index: 3,
            attempts: 2,
            message: "connection reset".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'case'"));
        assert!(msg.contains("batch 3"));
        assert!(msg.contains("2 attempt(s)"));
        assert_eq!(err.kind(), "batch_write");
    }

    #[test]
    fn test_data_shape_constructor() {
        let err = OcelError::data_shape("event", "#4", "missing 'ocel:timestamp'");
        assert_eq!(err.kind(), "data_shape");
        assert!(err.to_string().contains("record #4"));
    }
}
