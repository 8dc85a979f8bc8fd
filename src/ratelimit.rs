//! Per-client, per-route rate admission.
//!
//! Fixed rolling-window counters keyed by `(client, route)`. The map lives
//! behind a plain `Mutex` — checks are synchronous and never held across an
//! await, so concurrent increments from in-flight requests are safe.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Message returned with every 429 response.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Try again later.";

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<(String, String), Window>>,
    window: Duration,
}

impl RateLimiter {
    /// Standard limiter with a 60-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(60))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Record one request and report whether it is admitted.
    ///
    /// Counts reset when a key's window has elapsed. Stale entries are
    /// pruned opportunistically to bound the map size.
    pub fn check(&self, client: &str, route: &str, limit: u32) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        if windows.len() > 1024 {
            let horizon = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < horizon);
        }

        let window = windows
            .entry((client.to_string(), route.to_string()))
            .or_insert(Window {
                started: now,
                count: 0,
            });

        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.count = 0;
        }

        window.count += 1;
        window.count <= limit
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
