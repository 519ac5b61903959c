//! Registry Feed Example
//!
//! Drives traffic through a few registered breakers and prints the JSON
//! snapshots a status endpoint or dashboard would poll: per-breaker state
//! and counters, token bucket levels, and dead letter queue depths.
//!
//! Usage:
//!   cargo run --example registry_feed

use std::time::Duration;

use anyhow::Result;
use callguard::{CallError, CircuitBreakerConfig, CircuitBreakerRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let registry = CircuitBreakerRegistry::builder()
        .dead_letter_capacity(50)
        .build();

    let shopify = registry.get_or_create(
        "shopify_api",
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_timeout(Duration::from_secs(30))
            .with_rate_limit(5.0, 5),
    )?;
    let openai = registry.get_or_create(
        "openai_api",
        CircuitBreakerConfig::new().with_failure_threshold(5),
    )?;
    registry.get_or_create("stripe_api", CircuitBreakerConfig::new())?;

    // Healthy traffic on one key, a tripped circuit on another.
    for _ in 0..3 {
        let _ = openai
            .call(|| async { Ok::<_, &'static str>("completion") })
            .await;
    }
    for _ in 0..3 {
        let result = shopify
            .call(|| async { Err::<(), _>("502 Bad Gateway") })
            .await;
        if let Err(CallError::Inner(err)) = result {
            registry
                .dead_letters("shopify_api")
                .add("shopify.orders.sync", err, [("batch", "2026-08-25")]);
        }
    }

    println!("breakers:");
    println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);

    println!("\nshopify token bucket:");
    println!(
        "{}",
        serde_json::to_string_pretty(&shopify.limiter_snapshot())?
    );

    println!("\ndead letter queues:");
    println!(
        "{}",
        serde_json::to_string_pretty(&registry.dead_letter_snapshot())?
    );

    Ok(())
}
