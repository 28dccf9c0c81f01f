//! Pacing of inference requests.
//!
//! The completion service is shared and rate-limited, and candidates are
//! processed strictly one at a time. The orchestrator calls
//! [`RateLimiter::acquire`] right before each dispatch and
//! [`RateLimiter::complete`] once the response (or failure) is in. The
//! default [`MinIntervalLimiter`] keeps at least `interval` between the end
//! of one call and the start of the next. Skipped candidates never touch
//! the limiter, so a resumed run spends no time on work already done.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Gatekeeper for outgoing inference calls.
#[async_trait]
pub trait RateLimiter: Send {
    /// Wait until the next call may start.
    async fn acquire(&mut self);

    /// Mark the end of the call started after the last `acquire`.
    fn complete(&mut self);
}

/// Enforces a minimum pause between the end of one call and the start of
/// the next. The first call never waits.
#[derive(Debug, Clone)]
pub struct MinIntervalLimiter {
    interval: Duration,
    last_completed: Option<Instant>,
}

impl MinIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateLimiter for MinIntervalLimiter {
    async fn acquire(&mut self) {
        let Some(last) = self.last_completed else {
            return;
        };
        let ready_at = last + self.interval;
        let now = Instant::now();
        if ready_at > now {
            debug!("Rate limit: waiting {:?}", ready_at - now);
            sleep_until(ready_at).await;
        }
    }

    fn complete(&mut self) {
        self.last_completed = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;
    use tokio_test::{assert_pending, assert_ready, task};

    const EIGHT: Duration = Duration::from_secs(8);

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let mut limiter = MinIntervalLimiter::new(EIGHT);
        let mut acquire = task::spawn(limiter.acquire());
        assert_ready!(acquire.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_after_complete_is_pending() {
        let mut limiter = MinIntervalLimiter::new(EIGHT);
        limiter.acquire().await;
        limiter.complete();

        let mut acquire = task::spawn(limiter.acquire());
        assert_pending!(acquire.poll());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_full_interval_after_completion() {
        let mut limiter = MinIntervalLimiter::new(EIGHT);
        limiter.acquire().await;
        limiter.complete();

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= EIGHT);
        assert!(start.elapsed() < EIGHT + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_counts_from_end_of_call() {
        let mut limiter = MinIntervalLimiter::new(EIGHT);
        limiter.acquire().await;
        // A slow call does not shorten the pause that follows it.
        time::advance(Duration::from_secs(30)).await;
        limiter.complete();

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= EIGHT);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_is_credited() {
        let mut limiter = MinIntervalLimiter::new(EIGHT);
        limiter.acquire().await;
        limiter.complete();
        time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_never_waits() {
        let mut limiter = MinIntervalLimiter::new(Duration::ZERO);
        for _ in 0..3 {
            limiter.acquire().await;
            limiter.complete();
        }
        let mut acquire = task::spawn(limiter.acquire());
        assert_ready!(acquire.poll());
    }
}
