use std::sync::Arc;

use serde_json::Value;

use crate::logging::record::{
    Fields, Level, LogRecord, EVENT_AUDIT, EVENT_FIELD, EVENT_PERFORMANCE,
};
use crate::logging::sink::{default_sink, RecordSink};

/// Named producer of structured log records.
///
/// A logger without an explicit sink resolves the process default on every
/// emit, so swapping the default sink redirects components that were built
/// earlier. Cloning is cheap; components hold their own copy.
#[derive(Clone)]
pub struct StructuredLogger {
    name: String,
    sink: Option<Arc<dyn RecordSink>>,
}

impl StructuredLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: None,
        }
    }

    /// Bind this logger to a fixed sink instead of the process default.
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn dispatch(&self, record: LogRecord) {
        match &self.sink {
            Some(sink) => sink.emit(record),
            None => default_sink().emit(record),
        }
    }

    fn emit(&self, level: Level, message: &str, fields: &[(&str, Value)]) {
        let mut record = LogRecord::new(level, self.name.clone(), message);
        for (key, value) in fields {
            record.fields.insert((*key).to_string(), value.clone());
        }
        self.dispatch(record);
    }

    pub fn info(&self, message: &str, fields: &[(&str, Value)]) {
        self.emit(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: &[(&str, Value)]) {
        self.emit(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: &[(&str, Value)]) {
        self.emit(Level::Error, message, fields);
    }

    /// Emit a performance record for one timed operation.
    pub fn performance(&self, operation: &str, duration_ms: f64, fields: &[(&str, Value)]) {
        let mut extra = Fields::new();
        extra.insert(EVENT_FIELD.to_string(), Value::from(EVENT_PERFORMANCE));
        extra.insert("operation".to_string(), Value::from(operation));
        extra.insert("duration_ms".to_string(), Value::from(duration_ms));
        for (key, value) in fields {
            extra.insert((*key).to_string(), value.clone());
        }
        let mut record = LogRecord::new(Level::Info, self.name.clone(), operation);
        record.fields = extra;
        self.dispatch(record);
    }

    /// Emit an audit record: who did what to which resource, with what outcome.
    ///
    /// Audit records are append-only downstream; nothing in this layer ever
    /// rewrites or deletes one once emitted.
    pub fn audit(&self, action: &str, resource: &str, outcome: &str, fields: &[(&str, Value)]) {
        let mut extra = Fields::new();
        extra.insert(EVENT_FIELD.to_string(), Value::from(EVENT_AUDIT));
        extra.insert("action".to_string(), Value::from(action));
        extra.insert("resource".to_string(), Value::from(resource));
        extra.insert("outcome".to_string(), Value::from(outcome));
        for (key, value) in fields {
            extra.insert((*key).to_string(), value.clone());
        }
        let mut record = LogRecord::new(
            Level::Info,
            self.name.clone(),
            format!("{} {}", action, resource),
        );
        record.fields = extra;
        self.dispatch(record);
    }
}
