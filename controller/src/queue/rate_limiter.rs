use crate::constants::{RETRY_BASE_DELAY, RETRY_BURST, RETRY_MAX_DELAY, RETRY_QPS};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Decides how long an item waits before it is retried.
pub(crate) trait RateLimiter<T>: Send + Sync {
    /// Records a failure of `item` and returns the delay before its next attempt.
    fn when(&self, item: &T) -> Duration;

    /// Clears the failure history of `item`.
    fn forget(&self, item: &T);

    /// How many times `item` has been retried since it was last forgotten.
    fn num_requeues(&self, item: &T) -> u32;
}

/// Doubles the delay with every failure of the same item, up to a ceiling.
pub(crate) struct ItemExponentialFailure<T> {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<T, u32>>,
}

impl<T> ItemExponentialFailure<T> {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> RateLimiter<T> for ItemExponentialFailure<T>
where
    T: Clone + Eq + Hash + Send + Sync,
{
    fn when(&self, item: &T) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(item.clone()).or_insert(0);
        let exponent = (*count).min(63) as i32;
        *count += 1;
        let backoff = self.base.as_secs_f64() * 2f64.powi(exponent);
        if backoff >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(backoff)
        }
    }

    fn forget(&self, item: &T) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(item);
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item)
            .copied()
            .unwrap_or(0)
    }
}

/// Caps retries of all items together at `qps`, allowing bursts of `burst`.
pub(crate) struct TokenBucket {
    qps: f64,
    burst: f64,
    state: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

impl TokenBucket {
    pub(crate) fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst: f64::from(burst),
            state: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }
}

impl<T> RateLimiter<T> for TokenBucket {
    /// Reserves a token. When the bucket is empty the delay is the time until the reserved token
    /// has been refilled.
    fn when(&self, _: &T) -> Duration {
        let mut bucket = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;
        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-bucket.tokens / self.qps)
        }
    }

    fn forget(&self, _: &T) {}

    fn num_requeues(&self, _: &T) -> u32 {
        0
    }
}

/// Applies every limiter and waits for the slowest.
pub(crate) struct MaxOf<T> {
    limiters: Vec<Box<dyn RateLimiter<T>>>,
}

impl<T> MaxOf<T> {
    pub(crate) fn new(limiters: Vec<Box<dyn RateLimiter<T>>>) -> Self {
        Self { limiters }
    }
}

impl<T> RateLimiter<T> for MaxOf<T> {
    fn when(&self, item: &T) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(item))
            .max()
            .unwrap_or_default()
    }

    fn forget(&self, item: &T) {
        for limiter in &self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(&self, item: &T) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(item))
            .max()
            .unwrap_or(0)
    }
}

/// Per-item exponential backoff combined with an overall token bucket.
pub(crate) fn default_rate_limiter<T>() -> MaxOf<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    MaxOf::new(vec![
        Box::new(ItemExponentialFailure::new(
            RETRY_BASE_DELAY,
            RETRY_MAX_DELAY,
        )),
        Box::new(TokenBucket::new(RETRY_QPS, RETRY_BURST)),
    ])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let limiter = ItemExponentialFailure::new(Duration::from_secs(3), Duration::from_secs(180));
        let delays: Vec<u64> = (0..8).map(|_| limiter.when(&"a").as_secs()).collect();
        assert_eq!(delays, vec![3, 6, 12, 24, 48, 96, 180, 180]);
        assert_eq!(limiter.num_requeues(&"a"), 8);
        assert_eq!(limiter.when(&"b"), Duration::from_secs(3));
        limiter.forget(&"a");
        assert_eq!(limiter.num_requeues(&"a"), 0);
        assert_eq!(limiter.when(&"a"), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn token_bucket_allows_a_burst() {
        let limiter = TokenBucket::new(10.0, 2);
        assert_eq!(RateLimiter::<&str>::when(&limiter, &"a"), Duration::ZERO);
        assert_eq!(RateLimiter::<&str>::when(&limiter, &"b"), Duration::ZERO);
        let delay = RateLimiter::<&str>::when(&limiter, &"c");
        assert_eq!(delay, Duration::from_millis(100));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(RateLimiter::<&str>::when(&limiter, &"d"), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn max_of_limiters() {
        let limiter = default_rate_limiter::<&str>();
        assert_eq!(limiter.when(&"a"), Duration::from_secs(3));
        assert_eq!(limiter.when(&"a"), Duration::from_secs(6));
        assert_eq!(limiter.num_requeues(&"a"), 2);
        limiter.forget(&"a");
        assert_eq!(limiter.num_requeues(&"a"), 0);
    }
}
