//! Minimum spacing between completion calls.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Single-slot gate: a caller that arrives too early waits for its turn.
///
/// The lock is held while waiting, so concurrent callers are released one
/// at a time, each at least `min_interval` after the previous one.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then record it.
    pub async fn acquire(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready = previous + self.min_interval;
            if ready > Instant::now() {
                tracing::debug!(wait = ?(ready - Instant::now()), "Throttling completion call");
                tokio::time::sleep_until(ready).await;
            }
        }
        *last = Some(Instant::now());
    }
}
