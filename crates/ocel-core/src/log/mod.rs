//! Object-centric event log: model and JSON parsing.

pub mod model;
pub mod parser;

pub use model::{EventLog, LogEvent, ObjectRef};
pub use parser::{parse_event_log, read_event_log};
