use std::sync::Arc;
use std::time::Duration;

use callguard::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitState, ManualClock, RateLimiter,
};

fn throttled_breaker(rate: f64, burst: u32) -> (Arc<CircuitBreaker>, ManualClock) {
    let clock = ManualClock::new();
    let config = CircuitBreakerConfig::new()
        .with_failure_threshold(3)
        .with_timeout(Duration::from_secs(5))
        .with_rate_limit(rate, burst);
    let breaker = CircuitBreaker::with_clock("openai_api", config, Arc::new(clock.clone()))
        .expect("valid config");
    (Arc::new(breaker), clock)
}

async fn ok_call(breaker: &CircuitBreaker) -> Result<(), CallError<&'static str>> {
    breaker.call(|| async { Ok::<_, &'static str>(()) }).await
}

#[tokio::test]
async fn test_burst_capacity_then_rejection() {
    let (breaker, _clock) = throttled_breaker(1.0, 5);

    // The full burst goes through back to back.
    for _ in 0..5 {
        assert!(ok_call(&breaker).await.is_ok());
    }

    // The sixth call is rejected immediately, with a wait hint.
    match ok_call(&breaker).await {
        Err(CallError::RateLimited {
            name,
            retry_after_ms,
        }) => {
            assert_eq!(name, "openai_api");
            assert_eq!(retry_after_ms, Some(1_000));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tokens_refill_with_elapsed_time() {
    let (breaker, clock) = throttled_breaker(1.0, 5);
    for _ in 0..5 {
        assert!(ok_call(&breaker).await.is_ok());
    }
    assert!(ok_call(&breaker).await.is_err());

    // One second at 1 rps buys exactly one more call.
    clock.advance(Duration::from_secs(1));
    assert!(ok_call(&breaker).await.is_ok());
    assert!(matches!(
        ok_call(&breaker).await,
        Err(CallError::RateLimited { .. })
    ));
}

#[tokio::test]
async fn test_rate_limit_rejections_do_not_trip_breaker() {
    let (breaker, _clock) = throttled_breaker(1.0, 2);
    assert!(ok_call(&breaker).await.is_ok());
    assert!(ok_call(&breaker).await.is_ok());

    // Far more rejections than the failure threshold.
    for _ in 0..10 {
        assert!(matches!(
            ok_call(&breaker).await,
            Err(CallError::RateLimited { .. })
        ));
    }
    let snapshot = breaker.snapshot();
    assert_eq!(snapshot.state, CircuitState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(snapshot.total_rejections, 10);
    assert_eq!(snapshot.total_failures, 0);
}

#[tokio::test]
async fn test_throttling_applies_before_circuit_state() {
    let (breaker, _clock) = throttled_breaker(1.0, 5);

    // Three failures consume three tokens and open the circuit.
    for _ in 0..3 {
        let result = breaker
            .call(|| async { Err::<(), _>("upstream 500") })
            .await;
        assert!(matches!(result, Err(CallError::Inner(_))));
    }
    assert_eq!(breaker.current_state(), CircuitState::Open);

    // Two more attempts are rejected by the open circuit but still spend
    // tokens, because the bucket is consulted first.
    for _ in 0..2 {
        assert!(matches!(
            ok_call(&breaker).await,
            Err(CallError::CircuitOpen { .. })
        ));
    }

    // Bucket empty: the rejection reason flips to rate limiting.
    assert!(matches!(
        ok_call(&breaker).await,
        Err(CallError::RateLimited { .. })
    ));
}

#[tokio::test]
async fn test_tiny_rate_rejection_stays_an_error() {
    // A microscopic refill rate is a valid config, but the computed wait
    // far exceeds what Duration can hold. The hint saturates.
    let (breaker, _clock) = throttled_breaker(1e-30, 1);
    assert!(ok_call(&breaker).await.is_ok());

    match ok_call(&breaker).await {
        Err(CallError::RateLimited {
            name,
            retry_after_ms,
        }) => {
            assert_eq!(name, "openai_api");
            assert_eq!(retry_after_ms, Some(u64::MAX));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_default_config_never_throttles() {
    let clock = ManualClock::new();
    let breaker = CircuitBreaker::with_clock(
        "unthrottled",
        CircuitBreakerConfig::default(),
        Arc::new(clock.clone()),
    )
    .expect("valid config");
    for _ in 0..1_000 {
        assert!(breaker
            .call(|| async { Ok::<_, &'static str>(()) })
            .await
            .is_ok());
    }
    assert_eq!(breaker.snapshot().total_rejections, 0);
}

#[test]
fn test_standalone_limiter_burst_and_refill() {
    let clock = ManualClock::new();
    let limiter = RateLimiter::with_clock(1.0, 5.0, Arc::new(clock.clone())).expect("valid");

    for _ in 0..5 {
        assert!(limiter.try_acquire(1));
    }
    assert!(!limiter.try_acquire(1));
    assert_eq!(
        limiter.estimated_wait(1).map(|d| d.as_millis()),
        Some(1_000)
    );

    clock.advance(Duration::from_secs(1));
    assert!(limiter.try_acquire(1));
    assert!(!limiter.try_acquire(1));
}

#[test]
fn test_standalone_limiter_snapshot_tracks_tokens() {
    let clock = ManualClock::new();
    let limiter = RateLimiter::with_clock(2.0, 4.0, Arc::new(clock.clone())).expect("valid");
    assert!(limiter.try_acquire(3));

    let snapshot = limiter.snapshot();
    assert_eq!(snapshot.rate_per_second, 2.0);
    assert_eq!(snapshot.capacity, 4.0);
    assert_eq!(snapshot.tokens, 1.0);
    assert_eq!(snapshot.estimated_wait_ms, None);

    assert!(limiter.try_acquire(1));
    let empty = limiter.snapshot();
    assert_eq!(empty.tokens, 0.0);
    assert_eq!(empty.estimated_wait_ms, Some(500));
}
