//! 死信队列模块：有界 FIFO 缓存失败操作，供人工或自动重放。
//!
//! Bounded dead letter capture for failed operations.
//!
//! When a guarded call has exhausted its chances, the failure is recorded
//! here instead of being lost: what was attempted, why it failed, and the
//! request context it ran under. The queue is FIFO with a hard capacity;
//! when full, the oldest entry is evicted (and counted) to admit the new
//! one. Replay is the caller's business, typically after reading
//! [`DeadLetterQueue::list`].

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::clock::unix_timestamp;
use crate::logging::{RecordSink, StructuredLogger};

/// One captured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Unique id assigned at capture time.
    pub id: String,
    /// Name of the operation that failed (e.g. "shopify.orders.sync").
    pub operation: String,
    /// Rendered error message.
    pub error: String,
    /// Request context the operation ran under.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Wall-clock seconds since the Unix epoch at capture time.
    pub enqueued_at: f64,
    /// Delivery attempts made before the failure was parked here.
    pub attempts: u32,
}

impl DeadLetterEntry {
    pub fn new(operation: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            operation: operation.into(),
            error: error.to_string(),
            context: BTreeMap::new(),
            enqueued_at: unix_timestamp(),
            attempts: 1,
        }
    }

    pub fn with_context<I, K, V>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in context {
            self.context.insert(key.into(), value.into());
        }
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Age of this entry relative to now.
    pub fn age(&self) -> Duration {
        let age = unix_timestamp() - self.enqueued_at;
        if age > 0.0 {
            Duration::try_from_secs_f64(age).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

/// Point-in-time view of one queue, shaped for status feeds.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterQueueSnapshot {
    pub name: String,
    pub len: usize,
    pub max_size: usize,
    pub evicted_total: u64,
}

/// Bounded FIFO queue of failed operations.
pub struct DeadLetterQueue {
    name: String,
    max_size: usize,
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    evicted: AtomicU64,
    log: StructuredLogger,
}

impl DeadLetterQueue {
    pub fn new(name: impl Into<String>, max_size: usize) -> Self {
        Self::with_parts(name, max_size, None)
    }

    pub(crate) fn with_parts(
        name: impl Into<String>,
        max_size: usize,
        sink: Option<Arc<dyn RecordSink>>,
    ) -> Self {
        let mut log = StructuredLogger::new("dead_letter_queue");
        if let Some(sink) = sink {
            log = log.with_sink(sink);
        }
        Self {
            name: name.into(),
            max_size: max_size.max(1),
            entries: Mutex::new(VecDeque::new()),
            evicted: AtomicU64::new(0),
            log,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hard capacity; pushes beyond it evict the oldest entry.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // The lock only guards plain bookkeeping; no caller code runs while held.
    fn lock_entries(&self) -> MutexGuard<'_, VecDeque<DeadLetterEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture a failed operation, building the entry in place.
    ///
    /// Returns the stored entry so the caller can keep its id.
    pub fn add<I, K, V>(
        &self,
        operation: impl Into<String>,
        error: impl fmt::Display,
        context: I,
    ) -> DeadLetterEntry
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push(DeadLetterEntry::new(operation, error).with_context(context))
    }

    /// Append a pre-built entry, evicting the oldest if the queue is full.
    pub fn push(&self, entry: DeadLetterEntry) -> DeadLetterEntry {
        let evicted = {
            let mut entries = self.lock_entries();
            let evicted = if entries.len() == self.max_size {
                entries.pop_front()
            } else {
                None
            };
            entries.push_back(entry.clone());
            evicted
        };
        if let Some(evicted) = evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            self.log.warn(
                "dead letter evicted at capacity",
                &[
                    ("queue", json!(self.name)),
                    ("evicted_id", json!(evicted.id)),
                    ("operation", json!(evicted.operation)),
                ],
            );
        }
        self.log.info(
            "dead letter captured",
            &[
                ("queue", json!(self.name)),
                ("id", json!(entry.id)),
                ("operation", json!(entry.operation)),
                ("attempts", json!(entry.attempts)),
            ],
        );
        entry
    }

    /// Page through entries oldest-first.
    pub fn list(&self, offset: usize, limit: usize) -> Vec<DeadLetterEntry> {
        self.lock_entries()
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.lock_entries().iter().cloned().collect()
    }

    /// Drop entries older than `age`; returns how many were removed.
    pub fn purge_older_than(&self, age: Duration) -> usize {
        let cutoff = unix_timestamp() - age.as_secs_f64();
        let removed = {
            let mut entries = self.lock_entries();
            let before = entries.len();
            entries.retain(|entry| entry.enqueued_at >= cutoff);
            before - entries.len()
        };
        if removed > 0 {
            self.log.info(
                "dead letters purged",
                &[("queue", json!(self.name)), ("removed", json!(removed))],
            );
        }
        removed
    }

    /// Remove everything, regardless of age.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut entries = self.lock_entries();
            let before = entries.len();
            entries.clear();
            before
        };
        if removed > 0 {
            self.log.info(
                "dead letters cleared",
                &[("queue", json!(self.name)), ("removed", json!(removed))],
            );
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries dropped to make room since this queue was created.
    pub fn evicted_total(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DeadLetterQueueSnapshot {
        DeadLetterQueueSnapshot {
            name: self.name.clone(),
            len: self.len(),
            max_size: self.max_size,
            evicted_total: self.evicted_total(),
        }
    }
}
