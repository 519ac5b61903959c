use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::json;

use crate::breaker::config::CircuitBreakerConfig;
use crate::breaker::state::CircuitState;
use crate::breaker::window::FailureWindow;
use crate::clock::{unix_timestamp, Clock, SystemClock};
use crate::error::{CallError, Result};
use crate::limiter::{RateLimiter, RateLimiterSnapshot};
use crate::logging::{RecordSink, StructuredLogger};

/// Point-in-time view of one breaker, shaped for status feeds.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Failures currently inside the sliding window.
    pub failure_count: usize,
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
    /// Epoch seconds of the most recent trip, while not CLOSED.
    pub opened_at: Option<f64>,
    /// Remaining cooldown in ms, if currently OPEN.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    window: FailureWindow,
    half_open_successes: u32,
    in_flight_probes: u32,
    opened_at: Option<Instant>,
    opened_at_epoch: Option<f64>,
}

impl BreakerState {
    fn transition_to(&mut self, to: CircuitState) -> Transition {
        let from = self.circuit;
        self.circuit = to;
        Transition { from, to }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: CircuitState,
    to: CircuitState,
}

enum AdmissionOutcome {
    Admitted { probe: bool },
    Rejected { retry_after_ms: Option<u64> },
}

struct AdmitDecision {
    /// Lazy OPEN -> HALF_OPEN transition performed during admission, if any.
    transition: Option<Transition>,
    outcome: AdmissionOutcome,
}

/// Circuit breaker guarding one outbound dependency.
///
/// Wraps async operations with the full admission sequence: token-bucket
/// throttling first, then circuit state. Failures are counted over a sliding
/// window, an OPEN circuit rejects until its cooldown elapses, and recovery
/// goes through a limited number of HALF_OPEN probes. The internal lock only
/// covers bookkeeping; the wrapped operation always runs outside it.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    state: Mutex<BreakerState>,
    calls: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    log: StructuredLogger,
}

impl CircuitBreaker {
    /// Build a breaker on the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self> {
        Self::with_parts(name, config, Arc::new(SystemClock), None)
    }

    /// Build a breaker on an explicit clock, for deterministic tests.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::with_parts(name, config, clock, None)
    }

    pub(crate) fn with_parts(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
        sink: Option<Arc<dyn RecordSink>>,
    ) -> Result<Self> {
        config.validate()?;
        let name = name.into();
        let limiter = RateLimiter::with_clock(
            config.max_requests_per_second,
            config.max_burst as f64,
            clock.clone(),
        )?;
        let mut log = StructuredLogger::new("circuit_breaker");
        if let Some(sink) = sink {
            log = log.with_sink(sink);
        }
        let state = Mutex::new(BreakerState {
            circuit: CircuitState::Closed,
            window: FailureWindow::new(config.window, config.failure_threshold),
            half_open_successes: 0,
            in_flight_probes: 0,
            opened_at: None,
            opened_at_epoch: None,
        });
        Ok(Self {
            name,
            config,
            clock,
            limiter,
            state,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            log,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute `operation` under the breaker's admission rules.
    ///
    /// The sequence is fixed: the call is counted, the token bucket is
    /// consulted, then the circuit state. A rejected call never invokes
    /// `operation`. When the operation runs, its own error comes back
    /// unchanged inside [`CallError::Inner`]; success and failure are
    /// accounted before the result is returned.
    ///
    /// A call whose future is dropped mid-flight (cancelled or timed out by
    /// the caller) is recorded as a failure and releases any probe slot it
    /// held.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> std::result::Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.limiter.try_acquire(1) {
            self.rejections.fetch_add(1, Ordering::Relaxed);
            let retry_after_ms = self
                .limiter
                .estimated_wait(1)
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            self.log.audit(
                "call_rejected",
                &self.name,
                "rate_limited",
                &[("retry_after_ms", json!(retry_after_ms))],
            );
            return Err(CallError::RateLimited {
                name: self.name.clone(),
                retry_after_ms,
            });
        }

        let decision = self.admit();
        if let Some(transition) = decision.transition {
            self.log_transition(transition);
        }
        let probe = match decision.outcome {
            AdmissionOutcome::Admitted { probe } => probe,
            AdmissionOutcome::Rejected { retry_after_ms } => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                self.log.audit(
                    "call_rejected",
                    &self.name,
                    "circuit_open",
                    &[("retry_after_ms", json!(retry_after_ms))],
                );
                return Err(CallError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after_ms,
                });
            }
        };

        let started = self.clock.now();
        let mut guard = AbandonGuard {
            breaker: self,
            probe,
            armed: true,
        };
        let result = operation().await;
        guard.armed = false;
        let duration_ms = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_secs_f64()
            * 1000.0;

        let (transition, state, outcome) = match &result {
            Ok(_) => {
                let (transition, state) = self.note_success(probe);
                (transition, state, "success")
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let (transition, state) = self.note_failure(probe);
                (transition, state, "failure")
            }
        };
        if let Some(transition) = transition {
            self.log_transition(transition);
        }
        self.log.performance(
            "guarded_call",
            duration_ms,
            &[
                ("breaker", json!(self.name)),
                ("outcome", json!(outcome)),
                ("state", json!(state.as_str())),
            ],
        );

        result.map_err(CallError::Inner)
    }

    /// Current lifecycle state, without mutating anything.
    ///
    /// An elapsed cooldown is only acted on by the next call attempt, so a
    /// breaker past its timeout still reads OPEN here.
    pub fn current_state(&self) -> CircuitState {
        self.lock_state().circuit
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = self.clock.now();
        let mut st = self.lock_state();
        let failure_count = st.window.count(now);
        let open_remaining_ms = match (st.circuit, st.opened_at) {
            (CircuitState::Open, Some(at)) => {
                let elapsed = now.saturating_duration_since(at);
                let remaining = self.config.timeout.saturating_sub(elapsed);
                Some(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: st.circuit,
            failure_count,
            total_calls: self.calls.load(Ordering::Relaxed),
            total_failures: self.failures.load(Ordering::Relaxed),
            total_rejections: self.rejections.load(Ordering::Relaxed),
            opened_at: st.opened_at_epoch,
            open_remaining_ms,
        }
    }

    /// View of the embedded token bucket.
    pub fn limiter_snapshot(&self) -> RateLimiterSnapshot {
        self.limiter.snapshot()
    }

    /// Force the circuit back to CLOSED and zero all counters.
    ///
    /// Intended for operator tooling; in-flight calls finish under the rules
    /// they were admitted with.
    pub fn reset(&self) {
        {
            let mut st = self.lock_state();
            st.circuit = CircuitState::Closed;
            st.window.clear();
            st.half_open_successes = 0;
            st.opened_at = None;
            st.opened_at_epoch = None;
            // in_flight_probes is left alone so finishing probes stay balanced.
        }
        self.calls.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        self.log.audit("circuit_reset", &self.name, "closed", &[]);
    }

    // The lock only guards plain bookkeeping; no caller code runs while held.
    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> AdmitDecision {
        let now = self.clock.now();
        let mut st = self.lock_state();
        let mut transition = None;

        if st.circuit == CircuitState::Open {
            // Missing trip timestamp cannot arise through the public API;
            // treated as an elapsed cooldown.
            let elapsed = st
                .opened_at
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or(self.config.timeout);
            if elapsed < self.config.timeout {
                let remaining = self.config.timeout.saturating_sub(elapsed);
                return AdmitDecision {
                    transition: None,
                    outcome: AdmissionOutcome::Rejected {
                        retry_after_ms: Some(
                            u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                        ),
                    },
                };
            }
            transition = Some(st.transition_to(CircuitState::HalfOpen));
            st.half_open_successes = 0;
        }

        let outcome = if st.circuit == CircuitState::HalfOpen {
            if st.in_flight_probes >= self.config.max_half_open_requests {
                AdmissionOutcome::Rejected {
                    retry_after_ms: None,
                }
            } else {
                st.in_flight_probes += 1;
                AdmissionOutcome::Admitted { probe: true }
            }
        } else {
            AdmissionOutcome::Admitted { probe: false }
        };

        AdmitDecision {
            transition,
            outcome,
        }
    }

    fn note_success(&self, probe: bool) -> (Option<Transition>, CircuitState) {
        let mut st = self.lock_state();
        if probe {
            st.in_flight_probes = st.in_flight_probes.saturating_sub(1);
        }
        let transition = if st.circuit == CircuitState::HalfOpen {
            st.half_open_successes = st.half_open_successes.saturating_add(1);
            if st.half_open_successes >= self.config.success_threshold {
                let transition = st.transition_to(CircuitState::Closed);
                st.window.clear();
                st.half_open_successes = 0;
                st.opened_at = None;
                st.opened_at_epoch = None;
                Some(transition)
            } else {
                None
            }
        } else {
            None
        };
        (transition, st.circuit)
    }

    fn note_failure(&self, probe: bool) -> (Option<Transition>, CircuitState) {
        let now = self.clock.now();
        let mut st = self.lock_state();
        if probe {
            st.in_flight_probes = st.in_flight_probes.saturating_sub(1);
        }
        st.window.record(now);
        let transition = match st.circuit {
            // Any failed probe trips the circuit again immediately.
            CircuitState::HalfOpen => Some(Self::trip_locked(&mut st, now)),
            CircuitState::Closed => {
                if st.window.count(now) >= self.config.failure_threshold as usize {
                    Some(Self::trip_locked(&mut st, now))
                } else {
                    None
                }
            }
            // Stale completion from a call admitted before the trip.
            CircuitState::Open => None,
        };
        (transition, st.circuit)
    }

    fn trip_locked(st: &mut BreakerState, now: Instant) -> Transition {
        let transition = st.transition_to(CircuitState::Open);
        st.opened_at = Some(now);
        st.opened_at_epoch = Some(unix_timestamp());
        st.half_open_successes = 0;
        transition
    }

    fn on_abandoned(&self, probe: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let (transition, state) = self.note_failure(probe);
        self.log.audit(
            "call_abandoned",
            &self.name,
            "failure",
            &[("state", json!(state.as_str()))],
        );
        if let Some(transition) = transition {
            self.log_transition(transition);
        }
    }

    fn log_transition(&self, transition: Transition) {
        self.log.audit(
            "circuit_transition",
            &self.name,
            transition.to.as_str(),
            &[
                ("from", json!(transition.from.as_str())),
                ("to", json!(transition.to.as_str())),
            ],
        );
    }
}

/// Releases accounting for a call whose future never completed.
struct AbandonGuard<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.on_abandoned(self.probe);
        }
    }
}
