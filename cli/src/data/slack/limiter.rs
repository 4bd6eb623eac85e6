//! Token-bucket rate limiter
//!
//! Smooths the *average* outbound request rate; the semaphore in the
//! rate-limited client caps *peak* concurrency separately.
//!
//! # Algorithm
//!
//! The bucket holds up to `burst` tokens and refills continuously at `rate`
//! tokens per second. Every acquire takes one token; when the bucket is
//! empty the caller sleeps for exactly the time the next token needs to
//! accrue, then re-checks. Refill math runs on the tokio clock so paced
//! behavior is testable under paused time.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::data::error::DataError;

struct BucketState {
    available: f64,
    last_refill: Instant,
}

/// Shared token bucket. One instance covers all chat API methods.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that starts full
    pub fn new(rate: f64, burst: f64) -> Self {
        assert!(rate > 0.0 && burst >= 1.0);
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                available: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, sleeping until one accrues. Returns
    /// `DataError::Cancelled` when the token is cancelled mid-wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), DataError> {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.available = (state.available + elapsed * self.rate).min(self.burst);
                state.last_refill = now;

                if state.available >= 1.0 {
                    state.available -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.available) / self.rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(DataError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_free() {
        let bucket = TokenBucket::new(20.0, 50.0);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..50 {
            bucket.acquire(&cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_after_burst() {
        // 200 acquires against rate=20/s burst=50: the first 50 are free,
        // the remaining 150 are paced at 20/s, so total ~= 7.5s.
        let bucket = TokenBucket::new(20.0, 50.0);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        for _ in 0..200 {
            bucket.acquire(&cancel).await.unwrap();
        }
        let elapsed = start.elapsed().as_secs_f64();
        assert!(
            (6.75..=8.25).contains(&elapsed),
            "expected ~7.5s, got {elapsed:.3}s"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_bound_over_one_second() {
        // Over any 1-second window the number of grants must not exceed
        // burst + ceil(rate * 1s).
        let bucket = TokenBucket::new(20.0, 50.0);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let mut in_first_second = 0u32;
        for _ in 0..200 {
            bucket.acquire(&cancel).await.unwrap();
            if start.elapsed() <= Duration::from_secs(1) {
                in_first_second += 1;
            }
        }
        assert!(
            in_first_second <= 50 + 20,
            "granted {in_first_second} in first second"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let bucket = TokenBucket::new(1.0, 1.0);
        let cancel = CancellationToken::new();
        bucket.acquire(&cancel).await.unwrap();

        cancel.cancel();
        let err = bucket.acquire(&cancel).await.unwrap_err();
        assert!(matches!(err, DataError::Cancelled));
    }
}
