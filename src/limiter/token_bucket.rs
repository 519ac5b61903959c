use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, ErrorContext, Result};

#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimiterSnapshot {
    /// Tokens added per second.
    pub rate_per_second: f64,
    /// Maximum tokens the bucket can hold.
    pub capacity: f64,
    pub tokens: f64,
    /// Estimated wait time until a token is available (ms), if currently empty.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug)]
struct LimiterState {
    tokens: f64,
    last_refill: Instant,
}

/// Non-blocking token-bucket rate limiter.
///
/// The bucket starts full, refills continuously at `rate_per_second` up to
/// `capacity`, and never queues: a caller either gets its tokens now or is
/// told no. A rate of `0.0` disables throttling entirely.
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Build a limiter on the system clock.
    pub fn new(rate_per_second: f64, capacity: f64) -> Result<Self> {
        Self::with_clock(rate_per_second, capacity, Arc::new(SystemClock))
    }

    /// Build a limiter on an explicit clock. Tests drive this with
    /// [`ManualClock`](crate::clock::ManualClock).
    pub fn with_clock(rate_per_second: f64, capacity: f64, clock: Arc<dyn Clock>) -> Result<Self> {
        if !rate_per_second.is_finite() || rate_per_second < 0.0 {
            return Err(Error::configuration_with_context(
                "rate_per_second must be finite and non-negative",
                ErrorContext::new()
                    .with_field_path("rate_limiter.rate_per_second")
                    .with_details(format!("got {}", rate_per_second))
                    .with_source("config_validator"),
            ));
        }
        if !capacity.is_finite() || capacity < 0.0 {
            return Err(Error::configuration_with_context(
                "capacity must be finite and non-negative",
                ErrorContext::new()
                    .with_field_path("rate_limiter.capacity")
                    .with_details(format!("got {}", capacity))
                    .with_source("config_validator"),
            ));
        }
        if rate_per_second > 0.0 && capacity < 1.0 {
            return Err(Error::configuration_with_context(
                "capacity must be at least 1 when throttling is enabled",
                ErrorContext::new()
                    .with_field_path("rate_limiter.capacity")
                    .with_details(format!("got {}", capacity))
                    .with_source("config_validator"),
            ));
        }
        let state = Mutex::new(LimiterState {
            tokens: capacity,
            last_refill: clock.now(),
        });
        Ok(Self {
            rate: rate_per_second,
            capacity,
            clock,
            state,
        })
    }

    pub fn rate_per_second(&self) -> f64 {
        self.rate
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    // The lock only guards plain bookkeeping; no caller code runs while held.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn refill_locked(&self, st: &mut LimiterState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(st.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            st.tokens = (st.tokens + elapsed * self.rate).min(self.capacity);
            st.last_refill = now;
        }
    }

    /// Try to take `permits` tokens without waiting; returns true on success.
    ///
    /// With throttling disabled (rate `0.0`) this always succeeds. Asking for
    /// more permits than the bucket can ever hold always fails.
    pub fn try_acquire(&self, permits: u32) -> bool {
        if self.rate <= 0.0 || permits == 0 {
            return true;
        }
        let needed = permits as f64;
        let mut st = self.lock_state();
        self.refill_locked(&mut st);
        if st.tokens >= needed {
            st.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Estimated time until `permits` tokens are available.
    ///
    /// `None` means either "available right now" or "never" (throttling
    /// disabled, or `permits` exceeds capacity).
    pub fn estimated_wait(&self, permits: u32) -> Option<Duration> {
        if self.rate <= 0.0 || permits == 0 {
            return None;
        }
        let needed = permits as f64;
        if needed > self.capacity {
            return None;
        }
        let mut st = self.lock_state();
        self.refill_locked(&mut st);
        if st.tokens >= needed {
            None
        } else {
            let missing = needed - st.tokens;
            // A microscopic rate can push the wait past Duration's range.
            Some(Duration::try_from_secs_f64(missing / self.rate).unwrap_or(Duration::MAX))
        }
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.lock_state();
        if self.rate > 0.0 {
            self.refill_locked(&mut st);
        }
        let estimated_wait_ms = if self.rate > 0.0 && st.tokens < 1.0 {
            Some(((1.0 - st.tokens) / self.rate * 1000.0) as u64)
        } else {
            None
        };
        RateLimiterSnapshot {
            rate_per_second: self.rate,
            capacity: self.capacity,
            tokens: st.tokens,
            estimated_wait_ms,
        }
    }
}
