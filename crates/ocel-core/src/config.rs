//! Loader configuration.
//!
//! Read once by the binary and passed explicitly to the pipeline. Accepts the
//! legacy JSON layout (`neo4j.URI`, `neo4j.username`) as well as TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{OcelError, OcelResult};

const DEFAULT_BATCH_SIZE: usize = 1000;

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    #[serde(alias = "URI")]
    pub uri: String,
    #[serde(alias = "username")]
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connections: 8,
            fetch_size: 500,
        }
    }
}

/// Retry policy for batch writes that fail with a transient store error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first one.
    pub attempts: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff_ms: 500,
        }
    }
}

/// Top-level loader configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub neo4j: GraphConfig,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Event log to load. Only `load` needs it.
    #[serde(default)]
    pub data_file: PathBuf,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Run the case/activity/resource/object stages concurrently.
    #[serde(default = "default_parallel_stages")]
    pub parallel_stages: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_parallel_stages() -> bool {
    true
}

impl Config {
    /// Build a config for `data_file` with every other setting defaulted.
    pub fn with_data_file(data_file: impl Into<PathBuf>) -> Self {
        Self {
            neo4j: GraphConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            data_file: data_file.into(),
            retry: RetryConfig::default(),
            parallel_stages: true,
            log_file: None,
        }
    }

    /// Load a config file, apply environment overrides and validate.
    ///
    /// Files ending in `.toml` are parsed as TOML, anything else as JSON.
    /// A relative `data_file` is resolved against the config file's directory.
    pub fn load(path: &Path) -> OcelResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OcelError::config(format!("cannot read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&raw, path)?;

        if !config.data_file.as_os_str().is_empty() && config.data_file.is_relative() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                config.data_file = dir.join(&config.data_file);
            }
        }

        config.apply_env();
        config.validate()?;
        debug!(path = %path.display(), batch_size = config.batch_size, "Configuration loaded");
        Ok(config)
    }

    fn parse(raw: &str, path: &Path) -> OcelResult<Self> {
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            toml::from_str(raw)
                .map_err(|e| OcelError::config(format!("invalid TOML in {}: {}", path.display(), e)))
        } else {
            serde_json::from_str(raw)
                .map_err(|e| OcelError::config(format!("invalid JSON in {}: {}", path.display(), e)))
        }
    }

    /// Override connection settings from `NEO4J_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.neo4j.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.neo4j.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.neo4j.password = password;
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.neo4j.database = database;
        }
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> OcelResult<()> {
        if self.batch_size == 0 {
            return Err(OcelError::config("batch_size must be a positive integer"));
        }
        if self.neo4j.uri.trim().is_empty() {
            return Err(OcelError::config("neo4j.uri must not be empty"));
        }
        if self.neo4j.max_connections == 0 {
            return Err(OcelError::config("neo4j.max_connections must be positive"));
        }
        if self.retry.attempts == 0 {
            return Err(OcelError::config("retry.attempts must be at least 1"));
        }
        Ok(())
    }

    /// The event log path, or a config error when none is set.
    pub fn require_data_file(&self) -> OcelResult<&Path> {
        if self.data_file.as_os_str().is_empty() {
            return Err(OcelError::config("data_file must be set to load an event log"));
        }
        Ok(&self.data_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_legacy_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "config.json",
            r#"{
                "neo4j": {"URI": "neo4j+s://demo.databases.neo4j.io", "username": "loader", "password": "secret"},
                "batch_size": 250,
                "data_file": "log.json"
            }"#,
        );

        let config = Config::parse(&std::fs::read_to_string(&path).unwrap(), &path).unwrap();
        assert_eq!(config.neo4j.uri, "neo4j+s://demo.databases.neo4j.io");
        assert_eq!(config.neo4j.user, "loader");
        assert_eq!(config.neo4j.password, "secret");
        assert_eq!(config.neo4j.database, "neo4j");
        assert_eq!(config.batch_size, 250);
        assert_eq!(config.retry.attempts, 1);
        assert!(config.parallel_stages);
    }

    #[test]
    fn test_toml_layout_and_relative_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "loader.toml",
            r#"
                data_file = "events.json"
                batch_size = 10
                parallel_stages = false

                [neo4j]
                uri = "bolt://graph:7687"
                user = "neo4j"
                password = "pw"

                [retry]
                attempts = 3
                backoff_ms = 20
            "#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.batch_size, 10);
        assert!(!config.parallel_stages);
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.data_file, dir.path().join("events.json"));
    }

    #[test]
    fn test_data_file_is_optional_until_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config.json", r#"{"neo4j": {"uri": "bolt://graph:7687"}}"#);

        let config = Config::load(&path).unwrap();
        assert!(config.data_file.as_os_str().is_empty());
        assert_eq!(config.require_data_file().unwrap_err().kind(), "config");

        let config = Config::with_data_file("log.json");
        assert_eq!(config.require_data_file().unwrap(), Path::new("log.json"));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/ocel-config.json")).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "config.json", "{ not json");
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::with_data_file("log.json");
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(OcelError::Config(_))));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let mut config = Config::with_data_file("log.json");
        config.retry.attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::with_data_file("log.json");
        config.apply_overrides(|key| match key {
            "NEO4J_URI" => Some("bolt://override:7687".to_string()),
            "NEO4J_PASSWORD" => Some("from-env".to_string()),
            _ => None,
        });
        assert_eq!(config.neo4j.uri, "bolt://override:7687");
        assert_eq!(config.neo4j.password, "from-env");
        assert_eq!(config.neo4j.user, "neo4j");
    }
}
