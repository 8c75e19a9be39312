//! Configuration types for trace-drain
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then command-line flags (applied by the binary).
//!
//! ```yaml
//! source:
//!   hosts: [10.0.4.95, 10.0.4.96]
//!   keyspace: system_traces
//!   consistency: quorum
//! sink:
//!   url: http://localhost:8086
//!   database: cassandra_system_traces
//!   password: ${INFLUX_PASSWORD}
//! pipeline:
//!   interval_secs: 300
//!   batch_size: 1000
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use validator::Validate;

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::classify::{ClassifyTarget, DEFAULT_KEYWORDS};
use crate::error::{DrainError, Result};
use crate::transform::DEFAULT_MEASUREMENT;
use crate::types::SensitiveString;

/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Unquoted CQL identifier
static CQL_IDENTIFIER_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{0,47}$")
        .expect("identifier regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct DrainConfig {
    /// Source trace store
    #[serde(default)]
    #[validate(nested)]
    pub source: SourceSettings,

    /// Destination time-series store
    #[serde(default)]
    #[validate(nested)]
    pub sink: SinkSettings,

    /// Cycle and transformation settings
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            sink: SinkSettings::default(),
            pipeline: PipelineSettings::default(),
            log_level: default_log_level(),
        }
    }
}

/// Consistency level for source queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    #[default]
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

/// Source (Cassandra / Scylla) connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct SourceSettings {
    /// Contact points (host or host:port)
    #[serde(default = "default_hosts")]
    #[validate(length(min = 1))]
    pub hosts: Vec<String>,

    /// Keyspace holding the trace table
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Trace table drained each cycle
    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default)]
    pub consistency: ConsistencyLevel,

    #[serde(default = "default_source_timeout_ms")]
    #[validate(range(min = 1))]
    pub connection_timeout_ms: u64,

    #[serde(default = "default_source_timeout_ms")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    /// Client-side timeout for `TRUNCATE`, which waits on every replica
    #[serde(default = "default_truncate_timeout_ms")]
    #[validate(range(min = 1))]
    pub truncate_timeout_ms: u64,

    /// Rows fetched per page
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100000))]
    pub page_size: i32,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<SensitiveString>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            keyspace: default_keyspace(),
            table: default_table(),
            consistency: ConsistencyLevel::default(),
            connection_timeout_ms: default_source_timeout_ms(),
            request_timeout_ms: default_source_timeout_ms(),
            truncate_timeout_ms: default_truncate_timeout_ms(),
            page_size: default_page_size(),
            username: None,
            password: None,
        }
    }
}

impl SourceSettings {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn truncate_timeout(&self) -> Duration {
        Duration::from_millis(self.truncate_timeout_ms)
    }
}

fn default_hosts() -> Vec<String> {
    vec!["127.0.0.1".to_string()]
}

fn default_keyspace() -> String {
    "system_traces".to_string()
}

fn default_table() -> String {
    "sessions".to_string()
}

fn default_source_timeout_ms() -> u64 {
    6000
}

/// Matches the server's default `truncate_request_timeout_in_ms`
fn default_truncate_timeout_ms() -> u64 {
    60_000
}

fn default_page_size() -> i32 {
    5000
}

/// Destination (InfluxDB) settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct SinkSettings {
    /// Base URL of the HTTP API
    #[serde(default = "default_url")]
    #[validate(url)]
    pub url: String,

    /// Target database
    #[serde(default = "default_database")]
    #[validate(length(min = 1))]
    pub database: String,

    /// Measurement written for every point
    #[serde(default = "default_measurement")]
    #[validate(length(min = 1))]
    pub measurement: String,

    /// Retention policy (database default when unset)
    #[serde(default)]
    pub retention_policy: Option<String>,

    #[serde(default = "default_sink_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<SensitiveString>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            measurement: default_measurement(),
            retention_policy: None,
            timeout_ms: default_sink_timeout_ms(),
            username: None,
            password: None,
        }
    }
}

impl SinkSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_database() -> String {
    "cassandra_system_traces".to_string()
}

fn default_measurement() -> String {
    DEFAULT_MEASUREMENT.to_string()
}

fn default_sink_timeout_ms() -> u64 {
    30_000
}

/// Cycle settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct PipelineSettings {
    /// Seconds between drain cycles
    #[serde(default = "default_interval_secs")]
    #[validate(range(min = 1))]
    pub interval_secs: u64,

    /// Points per destination write
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 100000))]
    pub batch_size: usize,

    /// Text inspected for classification
    #[serde(default)]
    pub classify_on: ClassifyTarget,

    /// Classification keywords, highest priority first
    #[serde(default = "default_keywords")]
    #[validate(length(min = 1))]
    pub keywords: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            classify_on: ClassifyTarget::default(),
            keywords: default_keywords(),
        }
    }
}

impl PipelineSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DrainConfig {
    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DrainError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        config.check()?;
        Ok(config)
    }

    /// Parse YAML after environment expansion, without validating
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        serde_yaml::from_str(&expanded)
            .map_err(|e| DrainError::config(format!("failed to parse config: {}", e)))
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate field constraints and the identifiers that end up in CQL text
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| DrainError::config(e.to_string()))?;

        for (what, ident) in [
            ("source.keyspace", &self.source.keyspace),
            ("source.table", &self.source.table),
        ] {
            if !CQL_IDENTIFIER_REGEX.is_match(ident) {
                return Err(DrainError::config(format!(
                    "{} '{}' is not a valid CQL identifier",
                    what, ident
                )));
            }
        }

        if self.source.hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(DrainError::config("source.hosts contains an empty entry"));
        }
        if self.pipeline.keywords.iter().any(|k| k.is_empty()) {
            return Err(DrainError::config("pipeline.keywords contains an empty entry"));
        }
        if self.source.password.is_some() && self.source.username.is_none() {
            return Err(DrainError::config(
                "source.password is set without source.username",
            ));
        }

        Ok(())
    }

    /// JSON schema of the configuration file
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(DrainConfig)).unwrap_or_default()
    }
}
