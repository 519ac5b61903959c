//! 限流器模块：令牌桶算法控制出站调用吞吐。
//!
//! Token-bucket rate limiting for outbound call throughput.
//!
//! The limiter is deliberately non-blocking: callers get an immediate
//! yes/no plus an estimated wait, and decide for themselves whether to
//! retry later. One instance guards one protected resource key.

mod token_bucket;

pub use token_bucket::{RateLimiter, RateLimiterSnapshot};
