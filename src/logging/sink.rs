use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::logging::record::{Level, LogRecord};

/// Destination for structured log records.
///
/// Emission is synchronous and infallible: sinks run on bookkeeping paths
/// inside the call sequence and must never block it on I/O or surface errors
/// into the guarded call.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: LogRecord);
}

/// Sink that drops every record.
pub struct NoopRecordSink;

impl RecordSink for NoopRecordSink {
    fn emit(&self, _record: LogRecord) {}
}

/// Default sink: forwards records to the `tracing` subscriber at the
/// matching level, with context and extra fields rendered as JSON.
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, record: LogRecord) {
        let context = serde_json::to_string(&record.context).unwrap_or_default();
        let fields = Value::Object(record.fields.clone()).to_string();
        match record.level {
            Level::Info => tracing::info!(
                target: "callguard",
                logger = %record.logger,
                context = %context,
                fields = %fields,
                "{}",
                record.message
            ),
            Level::Warn => tracing::warn!(
                target: "callguard",
                logger = %record.logger,
                context = %context,
                fields = %fields,
                "{}",
                record.message
            ),
            Level::Error => tracing::error!(
                target: "callguard",
                logger = %record.logger,
                context = %context,
                fields = %fields,
                "{}",
                record.message
            ),
        }
    }
}

/// Console sink for debugging: one JSON line per record.
pub struct ConsoleRecordSink {
    prefix: String,
}

impl ConsoleRecordSink {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for ConsoleRecordSink {
    fn default() -> Self {
        Self::new("[callguard]")
    }
}

impl RecordSink for ConsoleRecordSink {
    fn emit(&self, record: LogRecord) {
        println!(
            "{} {}",
            self.prefix,
            serde_json::to_string(&record).unwrap_or_default()
        );
    }
}

/// In-memory sink for testing.
///
/// General records live in a bounded ring; audit records are additionally
/// copied into an append-only trail that nothing in this layer mutates or
/// truncates, so audit history survives both ring eviction and [`clear`].
///
/// [`clear`]: InMemoryRecordSink::clear
pub struct InMemoryRecordSink {
    records: RwLock<VecDeque<LogRecord>>,
    audit: RwLock<Vec<LogRecord>>,
    max_records: usize,
}

impl InMemoryRecordSink {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            audit: RwLock::new(Vec::new()),
            max_records: max_records.max(1),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn records_for_logger(&self, logger: &str) -> Vec<LogRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.logger == logger)
            .cloned()
            .collect()
    }

    /// The append-only audit trail, oldest first.
    pub fn audit_records(&self) -> Vec<LogRecord> {
        self.audit
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops buffered general records. The audit trail is left untouched.
    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl RecordSink for InMemoryRecordSink {
    fn emit(&self, record: LogRecord) {
        if record.is_audit() {
            self.audit
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(record.clone());
        }
        let mut records = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        records.push_back(record);
        if records.len() > self.max_records {
            records.pop_front();
        }
    }
}

/// Composite sink fanning records out to multiple destinations.
pub struct CompositeRecordSink {
    sinks: Vec<Arc<dyn RecordSink>>,
}

impl CompositeRecordSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Default for CompositeRecordSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for CompositeRecordSink {
    fn emit(&self, record: LogRecord) {
        for sink in &self.sinks {
            sink.emit(record.clone());
        }
    }
}

static DEFAULT_SINK: once_cell::sync::Lazy<RwLock<Arc<dyn RecordSink>>> =
    once_cell::sync::Lazy::new(|| RwLock::new(Arc::new(TracingSink)));

/// Returns the process-wide default record sink.
pub fn default_sink() -> Arc<dyn RecordSink> {
    DEFAULT_SINK
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replaces the process-wide default record sink.
///
/// Loggers without an explicit sink resolve the default at emit time, so a
/// sink installed here is picked up by components built earlier.
pub fn set_default_sink(sink: Arc<dyn RecordSink>) {
    *DEFAULT_SINK
        .write()
        .unwrap_or_else(PoisonError::into_inner) = sink;
}
