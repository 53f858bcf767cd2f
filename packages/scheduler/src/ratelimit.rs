//! Token-bucket rate limiting, shared per external dependency (LLM
//! provider, each geocoder tier, the datastore) across worker tasks via
//! `Arc`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A simple token bucket: `capacity` tokens, refilled continuously at
/// `refill_per_sec` tokens/second. `acquire` blocks (via `tokio::time::sleep`)
/// until a token is available rather than rejecting the caller.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity: f64::from(capacity),
            refill_per_sec,
            state: Mutex::new(BucketState { tokens: f64::from(capacity), last_refill: Instant::now() }),
        }
    }

    /// Waits until a token is available, then consumes one.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
                }
            };

            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TokenBucket;
    use std::sync::Arc;

    #[tokio::test]
    async fn acquire_drains_capacity_without_blocking() {
        let bucket = TokenBucket::new(3, 1.0);
        for _ in 0..3 {
            tokio::time::timeout(std::time::Duration::from_millis(50), bucket.acquire())
                .await
                .expect("should not block while tokens remain");
        }
    }

    #[tokio::test]
    async fn acquire_blocks_once_capacity_exhausted() {
        let bucket = Arc::new(TokenBucket::new(1, 1.0));
        bucket.acquire().await;
        tokio::time::timeout(std::time::Duration::from_millis(5), bucket.acquire())
            .await
            .expect_err("bucket refilling at 1 token/sec should not produce a token within 5ms");
    }
}
