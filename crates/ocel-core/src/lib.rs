//! OCEL Core Library
//!
//! Event-log model, configuration and error types shared by the graph loader
//! and its command-line front end.

pub mod config;
pub mod error;
pub mod log;
pub mod time;

pub use config::{Config, GraphConfig, RetryConfig};
pub use error::{OcelError, OcelResult};
pub use log::{EventLog, LogEvent, ObjectRef};
