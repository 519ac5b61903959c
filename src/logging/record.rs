use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::unix_timestamp;
use crate::logging::context::current_context;

/// Context key carrying the request correlation id.
pub const REQUEST_ID: &str = "request_id";
/// Context key carrying the acting agent's name.
pub const AGENT: &str = "agent";

/// Marker field distinguishing record kinds inside a shared stream.
pub(crate) const EVENT_FIELD: &str = "event";
pub(crate) const EVENT_AUDIT: &str = "audit";
pub(crate) const EVENT_PERFORMANCE: &str = "performance";

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra key/value payload attached to a record, flattened on serialization.
pub type Fields = serde_json::Map<String, Value>;

/// One structured log record.
///
/// Serializes to a flat JSON object: fixed envelope fields first, then any
/// extra fields merged at the top level, so downstream collectors can index
/// them without unwrapping a nested payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Wall-clock seconds since the Unix epoch.
    pub timestamp: f64,
    pub level: Level,
    /// Name of the logger that produced the record.
    pub logger: String,
    pub message: String,
    /// Ambient key/value context captured from the current task scope.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl LogRecord {
    /// Build a record stamped with the current time and task-scoped context.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: unix_timestamp(),
            level,
            logger: logger.into(),
            message: message.into(),
            context: current_context(),
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Fetch an extra field by name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True for records produced by the audit channel.
    pub fn is_audit(&self) -> bool {
        self.fields
            .get(EVENT_FIELD)
            .and_then(Value::as_str)
            .map(|kind| kind == EVENT_AUDIT)
            .unwrap_or(false)
    }

    /// True for records produced by the performance channel.
    pub fn is_performance(&self) -> bool {
        self.fields
            .get(EVENT_FIELD)
            .and_then(Value::as_str)
            .map(|kind| kind == EVENT_PERFORMANCE)
            .unwrap_or(false)
    }
}
