use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a minimum interval between outbound calls. Each strategy owns its
/// own instance, so independent runs never interfere with each other.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until at least `min_interval` has passed since the previous
    /// `wait`, then record the current time as the new last call.
    pub async fn wait(&self) {
        let pause = {
            let last = self.last_call.lock().unwrap();
            last.map(|t| self.min_interval.saturating_sub(t.elapsed()))
        };
        if let Some(pause) = pause {
            if !pause.is_zero() {
                debug!(?pause, "rate limit: pausing before next request");
                sleep(pause).await;
            }
        }
        *self.last_call.lock().unwrap() = Some(Instant::now());
    }
}
