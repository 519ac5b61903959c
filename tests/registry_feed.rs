use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use callguard::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, ManualClock,
};

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new()
        .with_failure_threshold(2)
        .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_instance() {
    let registry = Arc::new(CircuitBreakerRegistry::new());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .get_or_create("shopify_api", config())
                .expect("valid config")
        }));
    }

    let mut pointers = HashSet::new();
    for task in tasks {
        let breaker: Arc<CircuitBreaker> = task.await.expect("task");
        pointers.insert(Arc::as_ptr(&breaker) as usize);
    }
    assert_eq!(pointers.len(), 1, "every task must share one breaker");
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_builder_clock_flows_into_breakers() {
    let clock = ManualClock::new();
    let registry = CircuitBreakerRegistry::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    let breaker = registry
        .get_or_create("shopify_api", config())
        .expect("valid config");

    for _ in 0..2 {
        let _ = breaker
            .call(|| async { Err::<(), _>("upstream 503") })
            .await;
    }
    assert_eq!(breaker.current_state(), CircuitState::Open);

    // Advancing the injected clock is enough to reach HALF_OPEN.
    clock.advance(Duration::from_secs(5));
    assert!(breaker
        .call(|| async { Ok::<_, &'static str>(()) })
        .await
        .is_ok());
    assert_eq!(breaker.current_state(), CircuitState::HalfOpen);
}

#[tokio::test]
async fn test_snapshot_feed_serializes_for_dashboards() {
    let clock = ManualClock::new();
    let registry = CircuitBreakerRegistry::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    let breaker = registry
        .get_or_create("shopify_api", config())
        .expect("valid config");
    registry
        .get_or_create("openai_api", config())
        .expect("valid config");

    for _ in 0..2 {
        let _ = breaker
            .call(|| async { Err::<(), _>("upstream 503") })
            .await;
    }

    let feed = serde_json::to_value(registry.snapshot()).expect("serializable feed");
    let entries = feed.as_array().expect("array feed");
    assert_eq!(entries.len(), 2);

    // Sorted by name: openai first.
    assert_eq!(entries[0]["name"], "openai_api");
    assert_eq!(entries[0]["state"], "closed");
    assert_eq!(entries[0]["total_calls"], 0);
    assert!(entries[0]["opened_at"].is_null());

    assert_eq!(entries[1]["name"], "shopify_api");
    assert_eq!(entries[1]["state"], "open");
    assert_eq!(entries[1]["failure_count"], 2);
    assert_eq!(entries[1]["total_failures"], 2);
    assert!(entries[1]["opened_at"].as_f64().unwrap() > 0.0);
    assert_eq!(entries[1]["open_remaining_ms"], 5_000);
}

#[tokio::test]
async fn test_reset_all_closes_every_breaker() {
    let registry = CircuitBreakerRegistry::new();
    for name in ["a", "b"] {
        let breaker = registry.get_or_create(name, config()).expect("valid config");
        for _ in 0..2 {
            let _ = breaker
                .call(|| async { Err::<(), _>("upstream 500") })
                .await;
        }
        assert_eq!(breaker.current_state(), CircuitState::Open);
    }

    registry.reset_all();
    for snapshot in registry.snapshot() {
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.total_calls, 0);
    }
}

#[tokio::test]
async fn test_limiter_snapshot_rides_along() {
    let clock = ManualClock::new();
    let registry = CircuitBreakerRegistry::builder()
        .clock(Arc::new(clock.clone()))
        .build();
    let breaker = registry
        .get_or_create("throttled", config().with_rate_limit(2.0, 4))
        .expect("valid config");

    assert!(breaker
        .call(|| async { Ok::<_, &'static str>(()) })
        .await
        .is_ok());
    let limiter = breaker.limiter_snapshot();
    assert_eq!(limiter.rate_per_second, 2.0);
    assert_eq!(limiter.capacity, 4.0);
    assert_eq!(limiter.tokens, 3.0);
}
