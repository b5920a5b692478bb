// SPDX-License-Identifier: MIT

//! Token buckets and retry backoff for the chat-transport adapter (§4.6).

use ojb_core::Clock;
use parking_lot::Mutex;
use std::time::Duration;

/// A simple fixed-window token bucket: `capacity` tokens refill every `window`.
///
/// Not a leaky bucket or a sliding window — the source design's rate limiter resets to full
/// capacity at window boundaries, which is simpler to reason about and matches the spec's
/// "30 req/s, 1s window" / "20 req/min" phrasing literally.
pub struct TokenBucket<C: Clock> {
    clock: C,
    capacity: u32,
    window: Duration,
    state: Mutex<BucketState>,
}

struct BucketState {
    remaining: u32,
    window_start: std::time::Instant,
}

impl<C: Clock> TokenBucket<C> {
    pub fn new(clock: C, capacity: u32, window: Duration) -> Self {
        let now = clock.now();
        Self { clock, capacity, window, state: Mutex::new(BucketState { remaining: capacity, window_start: now }) }
    }

    /// Try to take one token. Returns `true` if a token was available (and consumes it), `false`
    /// if the bucket is currently empty.
    pub fn try_take(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if now.duration_since(state.window_start) >= self.window {
            state.remaining = self.capacity;
            state.window_start = now;
        }
        if state.remaining == 0 {
            return false;
        }
        state.remaining -= 1;
        true
    }
}

/// Exponential backoff for generic rate-limit codes: `2^attempt` seconds, bounded by
/// `max_retries` attempts total (§4.6). Returns `None` once attempts are exhausted.
pub fn backoff_for_attempt(attempt: u32, max_retries: u32) -> Option<Duration> {
    if attempt >= max_retries {
        return None;
    }
    Some(Duration::from_secs(2u64.saturating_pow(attempt)))
}
