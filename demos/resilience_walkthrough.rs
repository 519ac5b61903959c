//! Resilience Walkthrough
//!
//! This example walks the full guarded-call lifecycle:
//! - Circuit tripping on windowed failures
//! - Fast rejection while the circuit is OPEN
//! - Recovery through HALF_OPEN probes
//! - Token-bucket throttling ahead of the circuit
//! - Dead letter capture for work that exhausted its chances
//!
//! Records go to the default tracing sink; run with RUST_LOG=info to see
//! the transition and audit records as they happen.
//!
//! Usage:
//!   RUST_LOG=info cargo run --example resilience_walkthrough

use std::time::Duration;

use callguard::logging::request_scope;
use callguard::{CallError, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Callguard Resilience Walkthrough ===\n");

    let registry = CircuitBreakerRegistry::new();

    demo_trip_and_recovery(&registry).await?;
    demo_rate_limiting(&registry).await?;
    demo_dead_letters(&registry).await?;

    Ok(())
}

async fn demo_trip_and_recovery(
    registry: &CircuitBreakerRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Part 1: Trip and Recovery ---\n");

    let config = CircuitBreakerConfig::new()
        .with_failure_threshold(3)
        .with_success_threshold(2)
        .with_timeout(Duration::from_secs(2));
    let breaker = registry.get_or_create("shopify_api", config)?;

    println!("Three failures inside the window trip the circuit:");
    for i in 1..=3 {
        let result = breaker
            .call(|| async { Err::<(), _>("502 Bad Gateway") })
            .await;
        println!(
            "  call {}: {} (state: {})",
            i,
            result.unwrap_err(),
            breaker.current_state()
        );
    }

    println!("\nWhile OPEN, calls are rejected before the operation runs:");
    match breaker
        .call(|| async { Ok::<_, &'static str>("order batch") })
        .await
    {
        Err(CallError::CircuitOpen { retry_after_ms, .. }) => {
            println!("  rejected; retry in about {:?} ms", retry_after_ms);
        }
        other => println!("  unexpected outcome: {:?}", other),
    }

    println!("\nWaiting out the 2s cooldown...");
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    println!("Two successful probes close the circuit:");
    for i in 1..=2 {
        let result = breaker
            .call(|| async { Ok::<_, &'static str>("order batch") })
            .await;
        println!(
            "  probe {}: ok={} (state: {})",
            i,
            result.is_ok(),
            breaker.current_state()
        );
    }
    assert_eq!(breaker.current_state(), CircuitState::Closed);
    println!();
    Ok(())
}

async fn demo_rate_limiting(
    registry: &CircuitBreakerRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Part 2: Token-Bucket Throttling ---\n");

    let config = CircuitBreakerConfig::new().with_rate_limit(2.0, 2);
    let breaker = registry.get_or_create("openai_api", config)?;

    println!("Burst of 4 calls against capacity 2, refill 2/s:");
    for i in 1..=4 {
        match breaker
            .call(|| async { Ok::<_, &'static str>("completion") })
            .await
        {
            Ok(_) => println!("  call {}: allowed", i),
            Err(CallError::RateLimited { retry_after_ms, .. }) => {
                println!("  call {}: throttled, retry in {:?} ms", i, retry_after_ms);
            }
            Err(other) => println!("  call {}: unexpected: {}", i, other),
        }
    }

    let limiter = breaker.limiter_snapshot();
    println!(
        "\nBucket now holds {:.2} of {} tokens\n",
        limiter.tokens, limiter.capacity
    );
    Ok(())
}

async fn demo_dead_letters(
    registry: &CircuitBreakerRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Part 3: Dead Letter Capture ---\n");

    let config = CircuitBreakerConfig::new().with_failure_threshold(10);
    let breaker = registry.get_or_create("stripe_api", config)?;
    let dead_letters = registry.dead_letters("stripe_api");

    // Request context set here travels into every record and entry below.
    request_scope("req-1042", "billing_bot", async {
        let result = breaker
            .call(|| async { Err::<(), _>("card network unreachable") })
            .await;
        if let Err(CallError::Inner(err)) = result {
            let entry = dead_letters.add(
                "stripe.charge.create",
                err,
                [("customer", "cus_449")],
            );
            println!("Captured failed charge as dead letter {}", entry.id);
        }
    })
    .await;

    println!("\nQueued for replay:");
    for entry in dead_letters.list(0, 10) {
        println!(
            "  [{}] {} - {} (context: {:?})",
            entry.id, entry.operation, entry.error, entry.context
        );
    }
    println!();
    Ok(())
}
