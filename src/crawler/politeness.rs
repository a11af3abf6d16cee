//! Politeness gate
//!
//! Spaces out request start times against the site. Concurrent fragment
//! fetches queue on the gate, so at most one request starts per delay.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum delay between consecutive requests to the site
#[derive(Debug)]
pub struct PolitenessGate {
    min_delay: Duration,
    last_request_time: Mutex<Option<Instant>>,
}

impl PolitenessGate {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request_time: Mutex::new(None),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until a request may start, then records it
    pub async fn wait_turn(&self) {
        let mut last = self.last_request_time.lock().await;

        if let Some(wait) = time_until_next_request(*last, self.min_delay, Instant::now()) {
            tracing::trace!("Politeness delay: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        *last = Some(Instant::now());
    }
}

/// Returns None if a request can be made now, or the duration to wait otherwise
fn time_until_next_request(
    last: Option<Instant>,
    min_delay: Duration,
    now: Instant,
) -> Option<Duration> {
    let last = last?;
    let elapsed = now.saturating_duration_since(last);
    if elapsed < min_delay {
        Some(min_delay - elapsed)
    } else {
        None
    }
}
