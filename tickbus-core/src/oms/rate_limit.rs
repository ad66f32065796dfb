//! Fixed-window rate limiting for outbound order flow.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

/// Allows at most `limit` acquisitions per window. The window resets in full
/// once it elapses; there is no sliding credit.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Takes one slot from the current window. Returns `false` when the
    /// window is exhausted.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }
        if state.count < self.limit {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// Slots left in the current window.
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started.elapsed() >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(state.count)
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
