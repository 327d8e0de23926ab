use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spaces outbound fetches to a per-minute budget. Calls are delayed, never
/// dropped.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
}

impl RequestPacer {
    /// One request is allowed immediately; later ones are spread evenly
    /// across the minute.
    pub fn per_minute(max_requests: NonZeroU32) -> Self {
        let quota = Quota::per_minute(max_requests).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Take budget without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Wait until budget is available, then take it.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
