use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request pacing for one chain upstream.
///
/// Keeps a burst of page requests from tripping the gateway's own rate limit.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer").finish_non_exhaustive()
    }
}

impl RequestPacer {
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        let quota = quota_from_window(quota_window, quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn per_second(requests: u32) -> Self {
        Self::new(Duration::from_secs(1), requests)
    }

    /// Takes budget, waiting for the next free cell when the burst is spent.
    pub async fn until_ready(&self) {
        if let Err(wait) = self.try_acquire() {
            debug!(wait_ms = wait.as_millis() as u64, "pacing upstream request");
            self.limiter.until_ready().await;
        }
    }

    /// Takes budget without waiting. On refusal returns how long until the
    /// next cell frees up.
    fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = NonZeroU32::new(quota_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(safe_limit))
        .allow_burst(safe_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_once_burst_is_spent() {
        let pacer = RequestPacer::new(Duration::from_secs(60), 2);

        assert!(pacer.try_acquire().is_ok());
        assert!(pacer.try_acquire().is_ok());

        let wait = pacer.try_acquire().expect_err("third request should be paced");
        assert!(wait <= Duration::from_secs(30));
    }

    #[test]
    fn zero_limit_is_treated_as_one() {
        let pacer = RequestPacer::new(Duration::from_secs(60), 0);
        assert!(pacer.try_acquire().is_ok());
        assert!(pacer.try_acquire().is_err());
    }

    #[tokio::test]
    async fn until_ready_waits_out_a_spent_burst() {
        let pacer = RequestPacer::new(Duration::from_millis(100), 1);
        pacer.until_ready().await;

        let started = std::time::Instant::now();
        pacer.until_ready().await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(pacer.try_acquire().is_err(), "second wait spent the freed cell");
    }

    #[tokio::test]
    async fn until_ready_returns_when_budget_exists() {
        let pacer = RequestPacer::per_second(100);
        tokio::time::timeout(Duration::from_secs(1), pacer.until_ready())
            .await
            .expect("budget available immediately");
    }
}
