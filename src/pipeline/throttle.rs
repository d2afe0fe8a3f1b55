//! Process-wide fallback invocation throttle.

use std::time::{Duration, Instant};

/// Enforces a minimum interval between fallback classifier invocations,
/// regardless of which image triggers them.
///
/// The delay computation is pure over an injected `now` so tests can
/// drive it with fabricated instants.
#[derive(Debug)]
pub struct FallbackThrottle {
    min_interval: Duration,
    last_invocation: Option<Instant>,
}

impl FallbackThrottle {
    /// Create a throttle with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_invocation: None,
        }
    }

    /// How long to wait at `now` before the next invocation may start.
    pub fn delay_until_ready(&self, now: Instant) -> Duration {
        self.last_invocation.map_or(Duration::ZERO, |last| {
            self.min_interval
                .saturating_sub(now.saturating_duration_since(last))
        })
    }

    /// Record that an invocation started at `now`.
    pub fn mark_invoked(&mut self, now: Instant) {
        self.last_invocation = Some(now);
    }

    /// Sleep until the next invocation is allowed, then mark it started.
    pub async fn acquire(&mut self) {
        let delay = self.delay_until_ready(Instant::now());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.mark_invoked(Instant::now());
    }
}
