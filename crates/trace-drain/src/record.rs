//! Source-side trace record

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One row of the source trace table.
///
/// Null columns are already flattened by the reader: text and address columns
/// become empty strings, a null map becomes empty and a null duration becomes
/// zero. Only `started_at` stays optional, because a point cannot be
/// timestamped without it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceRecord {
    pub session_id: String,
    pub client: String,
    pub command: String,
    pub coordinator: String,
    /// Microseconds
    pub duration: i64,
    pub parameters: HashMap<String, String>,
    pub request: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl TraceRecord {
    /// Create a record with the given session id and request text
    pub fn new(session_id: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            request: request.into(),
            ..Default::default()
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_coordinator(mut self, coordinator: impl Into<String>) -> Self {
        self.coordinator = coordinator.into();
        self
    }

    pub fn with_duration(mut self, micros: i64) -> Self {
        self.duration = micros;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }
}
