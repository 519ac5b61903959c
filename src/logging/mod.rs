//! 结构化日志模块：带任务级上下文传播的性能与审计日志。
//!
//! Structured logging with task-scoped context propagation.
//!
//! Every record is a flat JSON object carrying a timestamp, level, logger
//! name, message, the ambient task context, and any extra fields. Records
//! flow into a [`RecordSink`]; the process default forwards to `tracing`,
//! and tests usually install an [`InMemoryRecordSink`].
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`StructuredLogger`] | Named producer of info/warn/error, performance, and audit records |
//! | [`LogRecord`] | One structured record with flattened extra fields |
//! | [`RecordSink`] | Trait for record destinations |
//! | [`TracingSink`] | Default sink, forwards to the `tracing` subscriber |
//! | [`InMemoryRecordSink`] | Bounded capture sink with an append-only audit trail |
//! | [`scope`] | Layer key/value context over the current task |

pub mod context;
pub mod logger;
pub mod record;
pub mod sink;

pub use context::{context_value, current_context, request_scope, scope, sync_scope};
pub use logger::StructuredLogger;
pub use record::{Fields, Level, LogRecord, AGENT, REQUEST_ID};
pub use sink::{
    default_sink, set_default_sink, CompositeRecordSink, ConsoleRecordSink, InMemoryRecordSink,
    NoopRecordSink, RecordSink, TracingSink,
};
