use std::time::Duration;

use crate::error::{Error, ErrorContext, Result};

/// Tunables for one circuit breaker and its embedded rate limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failures inside the sliding window that trip the circuit.
    pub failure_threshold: u32,
    /// Consecutive half-open successes required to close again.
    pub success_threshold: u32,
    /// How long an OPEN circuit rejects before allowing a probe.
    pub timeout: Duration,
    /// Width of the sliding failure window.
    pub window: Duration,
    /// Token refill rate; `0.0` disables throttling.
    pub max_requests_per_second: f64,
    /// Token bucket capacity. Ignored while throttling is disabled.
    pub max_burst: u32,
    /// Concurrent probes admitted while HALF_OPEN.
    pub max_half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            window: Duration::from_secs(60),
            max_requests_per_second: 0.0,
            max_burst: 0,
            max_half_open_requests: 1,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold for closing from HALF_OPEN
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the OPEN cooldown duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sliding failure window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Enable token-bucket throttling at `rate_per_second` with `burst` capacity
    pub fn with_rate_limit(mut self, rate_per_second: f64, burst: u32) -> Self {
        self.max_requests_per_second = rate_per_second;
        self.max_burst = burst;
        self
    }

    /// Set the number of concurrent HALF_OPEN probes
    pub fn with_max_half_open_requests(mut self, max: u32) -> Self {
        self.max_half_open_requests = max;
        self
    }

    /// Check every field before a breaker is built from this config.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(invalid(
                "failure_threshold must be at least 1",
                "config.failure_threshold",
                format!("got {}", self.failure_threshold),
            ));
        }
        if self.success_threshold == 0 {
            return Err(invalid(
                "success_threshold must be at least 1",
                "config.success_threshold",
                format!("got {}", self.success_threshold),
            ));
        }
        if self.timeout.is_zero() {
            return Err(invalid(
                "timeout must be non-zero",
                "config.timeout",
                "got 0s".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(invalid(
                "window must be non-zero",
                "config.window",
                "got 0s".to_string(),
            ));
        }
        if !self.max_requests_per_second.is_finite() || self.max_requests_per_second < 0.0 {
            return Err(invalid(
                "max_requests_per_second must be finite and non-negative",
                "config.max_requests_per_second",
                format!("got {}", self.max_requests_per_second),
            ));
        }
        if self.max_requests_per_second > 0.0 && self.max_burst == 0 {
            return Err(invalid(
                "max_burst must be at least 1 when throttling is enabled",
                "config.max_burst",
                format!("got {}", self.max_burst),
            ));
        }
        if self.max_half_open_requests == 0 {
            return Err(invalid(
                "max_half_open_requests must be at least 1",
                "config.max_half_open_requests",
                format!("got {}", self.max_half_open_requests),
            ));
        }
        Ok(())
    }
}

fn invalid(message: &str, field: &str, details: String) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config_validator"),
    )
}
