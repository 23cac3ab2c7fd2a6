use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

/// Minimum spacing between requests to the same remote host.
///
/// Keyed GCRA limiter with a burst of one: each host admits one request per
/// `min_interval`, and concurrent callers for a host queue behind each other.
/// A zero interval disables limiting.
pub struct HostRateLimiter {
    min_interval: Duration,
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl HostRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            limiter: Quota::with_period(min_interval).map(RateLimiter::keyed),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request to `host` is allowed.
    pub async fn acquire(&self, host: &str) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let key = host.to_string();
        if limiter.check_key(&key).is_ok() {
            return;
        }
        tracing::debug!(host, interval_ms = self.min_interval.as_millis() as u64, "Rate limiting request");
        limiter.until_key_ready(&key).await;
    }
}
