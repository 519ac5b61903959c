//! 熔断器模块：三态状态机隔离故障依赖，支持半开探测。
//!
//! Circuit breaking for outbound dependencies.
//!
//! The breaker is a three-state machine (CLOSED, OPEN, HALF_OPEN) with a
//! sliding failure window, a lazy cooldown, and bounded half-open probing.
//! Each breaker embeds a token-bucket [`RateLimiter`](crate::limiter::RateLimiter)
//! consulted before circuit state, so one `call` covers both concerns.

mod circuit;
mod config;
mod state;
mod window;

pub use circuit::{CircuitBreaker, CircuitBreakerSnapshot};
pub use config::CircuitBreakerConfig;
pub use state::CircuitState;
