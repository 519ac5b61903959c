use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of failure timestamps.
///
/// Memory is bounded two ways: stale samples are pruned against the window
/// width on every touch, and the deque itself is capped so a failure storm
/// cannot grow it without limit. The cap never sits below the threshold, so
/// dropping the oldest sample never masks a trip condition.
#[derive(Debug)]
pub(crate) struct FailureWindow {
    width: Duration,
    cap: usize,
    samples: VecDeque<Instant>,
}

impl FailureWindow {
    pub(crate) fn new(width: Duration, failure_threshold: u32) -> Self {
        let cap = (failure_threshold as usize)
            .saturating_mul(8)
            .clamp(16, 1024)
            .max(failure_threshold as usize);
        Self {
            width,
            cap,
            samples: VecDeque::with_capacity(cap.min(64)),
        }
    }

    /// Record one failure at `now`, pruning stale samples first.
    pub(crate) fn record(&mut self, now: Instant) {
        self.prune(now);
        if self.samples.len() == self.cap {
            self.samples.pop_front();
        }
        self.samples.push_back(now);
    }

    /// Failures still inside the window as of `now`.
    pub(crate) fn count(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.samples.len()
    }

    pub(crate) fn clear(&mut self) {
        self.samples.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(*oldest) >= self.width {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
