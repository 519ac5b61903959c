//! 熔断器注册表：按资源键惰性创建并管理熔断器与死信队列。
//!
//! Keyed registry of circuit breakers and dead letter queues.
//!
//! One registry instance serves the whole process: callers ask for a breaker
//! by resource key ("shopify_api", "openai_api", ...) and get the shared
//! instance back, created on first access. Creation is first-writer-wins;
//! a later caller presenting a different configuration keeps the existing
//! breaker and the mismatch is logged. Snapshots across every key feed
//! status endpoints and dashboards.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
use crate::clock::{Clock, SystemClock};
use crate::dlq::{DeadLetterQueue, DeadLetterQueueSnapshot};
use crate::error::Result;
use crate::logging::{RecordSink, StructuredLogger};

const DLQ_CAPACITY_ENV: &str = "CALLGUARD_DLQ_CAPACITY";
const DEFAULT_DLQ_CAPACITY: usize = 256;

/// Builder for [`CircuitBreakerRegistry`].
///
/// Dead letter capacity resolves in precedence order: explicit setting,
/// then the `CALLGUARD_DLQ_CAPACITY` environment variable, then 256.
pub struct RegistryBuilder {
    clock: Arc<dyn Clock>,
    dead_letter_capacity: Option<usize>,
    sink: Option<Arc<dyn RecordSink>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            dead_letter_capacity: None,
            sink: None,
        }
    }

    /// Use an explicit clock for every breaker this registry creates.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Capacity of each per-key dead letter queue.
    pub fn dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = Some(capacity);
        self
    }

    /// Route records from this registry and everything it creates to `sink`
    /// instead of the process default.
    pub fn record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> CircuitBreakerRegistry {
        let dlq_capacity = self
            .dead_letter_capacity
            .or_else(|| {
                std::env::var(DLQ_CAPACITY_ENV)
                    .ok()
                    .and_then(|raw| raw.parse::<usize>().ok())
            })
            .unwrap_or(DEFAULT_DLQ_CAPACITY);
        let mut log = StructuredLogger::new("registry");
        if let Some(sink) = &self.sink {
            log = log.with_sink(sink.clone());
        }
        CircuitBreakerRegistry {
            breakers: DashMap::new(),
            dead_letters: DashMap::new(),
            dlq_capacity,
            clock: self.clock,
            sink: self.sink,
            log,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide home for breakers and dead letter queues, keyed by resource.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    dead_letters: DashMap<String, Arc<DeadLetterQueue>>,
    dlq_capacity: usize,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn RecordSink>>,
    log: StructuredLogger,
}

impl CircuitBreakerRegistry {
    /// Registry with default settings; see [`RegistryBuilder`] for knobs.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Fetch the breaker for `name`, creating it with `config` on first use.
    ///
    /// Creation is first-writer-wins: when the breaker already exists, the
    /// offered configuration is ignored and a differing one logged.
    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Result<Arc<CircuitBreaker>> {
        config.validate()?;

        if let Some(existing) = self.breakers.get(name) {
            let existing = existing.value().clone();
            self.warn_on_mismatch(&existing, &config);
            return Ok(existing);
        }

        let mut mismatch = false;
        let breaker = match self.breakers.entry(name.to_string()) {
            Entry::Occupied(occupied) => {
                // Lost the creation race; keep the first writer's breaker.
                let existing = occupied.get().clone();
                mismatch = existing.config() != &config;
                existing
            }
            Entry::Vacant(vacant) => {
                let created = Arc::new(CircuitBreaker::with_parts(
                    name,
                    config.clone(),
                    self.clock.clone(),
                    self.sink.clone(),
                )?);
                vacant.insert(created.clone());
                self.log.info(
                    "circuit breaker created",
                    &[("breaker", serde_json::json!(name))],
                );
                created
            }
        };
        if mismatch {
            self.warn_mismatch(name);
        }
        Ok(breaker)
    }

    fn warn_on_mismatch(&self, existing: &CircuitBreaker, offered: &CircuitBreakerConfig) {
        if existing.config() != offered {
            self.warn_mismatch(existing.name());
        }
    }

    fn warn_mismatch(&self, name: &str) {
        self.log.warn(
            "configuration mismatch ignored for existing breaker",
            &[("breaker", serde_json::json!(name))],
        );
    }

    /// Fetch an existing breaker without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Dead letter queue for `name`, created on first access.
    pub fn dead_letters(&self, name: &str) -> Arc<DeadLetterQueue> {
        self.dead_letters
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(DeadLetterQueue::with_parts(
                    name,
                    self.dlq_capacity,
                    self.sink.clone(),
                ))
            })
            .value()
            .clone()
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Snapshot every breaker, ordered by name for stable feed output.
    pub fn snapshot(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Snapshot every dead letter queue, ordered by name.
    pub fn dead_letter_snapshot(&self) -> Vec<DeadLetterQueueSnapshot> {
        let mut snapshots: Vec<_> = self
            .dead_letters
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Reset one breaker to CLOSED; false when the key is unknown.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every registered breaker to CLOSED.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
