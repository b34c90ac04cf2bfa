//! Fixed-spacing request limiter shared by every caller of the remote store.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces calls at least `delay` apart, across all tasks holding a clone.
///
/// Notion allows roughly three requests per second per integration, so the
/// default spacing is 340 ms.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    delay: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait for the next free slot.
    ///
    /// The lock is held while sleeping, so concurrent callers queue up and
    /// are released one `delay` apart.
    pub async fn acquire(&self) {
        if self.delay.is_zero() {
            return;
        }
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
