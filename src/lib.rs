//! # callguard
//!
//! callguard 是出站集成调用的弹性保护层：熔断、限流、死信与审计日志。
//!
//! Resilience layer for outbound integration calls - circuit breaking,
//! token-bucket rate limiting, dead letter capture, and structured audit
//! logging behind one `call` wrapper.
//!
//! ## Overview
//!
//! Services that call third-party APIs (storefronts, model providers,
//! payment processors) on behalf of many internal agents need one place
//! that decides whether a call may go out at all, records what happened,
//! and keeps a degraded dependency from dragging the whole process down.
//! This library is that place: each protected resource key gets a circuit
//! breaker with an embedded rate limiter, failed work can be parked in a
//! bounded dead letter queue, and every decision leaves a structured
//! record.
//!
//! ## Core Behavior
//!
//! - **Wrap, don't replace**: the guarded operation's own error type comes
//!   back unchanged; rejections are distinct variants, never invented errors
//! - **Fail fast**: an OPEN circuit and an empty token bucket both reject
//!   without invoking the operation or blocking the caller
//! - **Recover carefully**: after the cooldown, a bounded number of probes
//!   decide between closing the circuit and tripping it again
//! - **Account for everything**: transitions, rejections, captures, and
//!   evictions all emit structured records with task-scoped context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use callguard::{CallError, CircuitBreakerConfig, CircuitBreakerRegistry};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> callguard::Result<()> {
//!     let registry = CircuitBreakerRegistry::new();
//!     let config = CircuitBreakerConfig::new()
//!         .with_failure_threshold(3)
//!         .with_timeout(Duration::from_secs(5))
//!         .with_rate_limit(10.0, 20);
//!     let breaker = registry.get_or_create("shopify_api", config)?;
//!
//!     match breaker.call(|| async { fetch_orders().await }).await {
//!         Ok(count) => println!("synced {count} orders"),
//!         Err(CallError::CircuitOpen { retry_after_ms, .. }) => {
//!             println!("shopify is cooling down ({retry_after_ms:?} ms)");
//!         }
//!         Err(CallError::RateLimited { .. }) => println!("throttled, try later"),
//!         Err(CallError::Inner(err)) => {
//!             registry
//!                 .dead_letters("shopify_api")
//!                 .add("shopify.orders.sync", &err, [("source", "quick_start")]);
//!         }
//!     }
//!     Ok(())
//! }
//!
//! async fn fetch_orders() -> std::result::Result<u64, std::io::Error> {
//!     Ok(42)
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`breaker`] | Circuit breaker state machine and guarded `call` |
//! | [`limiter`] | Non-blocking token-bucket rate limiter |
//! | [`dlq`] | Bounded dead letter queues for failed operations |
//! | [`registry`] | Per-key registry vending breakers and queues |
//! | [`logging`] | Structured records, sinks, and task-scoped context |
//! | [`clock`] | Injectable time source for deterministic tests |

pub mod breaker;
pub mod clock;
pub mod dlq;
pub mod limiter;
pub mod logging;
pub mod registry;

// Re-export main types for convenience
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dlq::{DeadLetterEntry, DeadLetterQueue, DeadLetterQueueSnapshot};
pub use limiter::{RateLimiter, RateLimiterSnapshot};
pub use logging::{Level, LogRecord, RecordSink, StructuredLogger};
pub use registry::{CircuitBreakerRegistry, RegistryBuilder};

/// Error type for the library
pub mod error;
pub use error::{CallError, Error, ErrorContext, Result};
