//! Per-key sliding-window rate limiting.
//!
//! Each key (normally a `ResourceClass`) gets its own `SlidingWindow`, created
//! lazily on first use. Admission is a single check-and-record under one lock,
//! so the scheduler tick and a manual refresh racing for the same slot can
//! never both be admitted.

mod window;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

pub use window::{RateLimitConfig, SlidingWindow};

/// Shared limiter; one instance per session and endpoint family.
#[derive(Debug)]
pub struct RateLimiter<K> {
    config: RateLimitConfig,
    windows: Mutex<HashMap<K, SlidingWindow>>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn with_window<R>(&self, key: &K, f: impl FnOnce(&mut SlidingWindow) -> R) -> R {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let config = self.config;
        let window = windows
            .entry(key.clone())
            .or_insert_with(|| SlidingWindow::new(config));
        f(window)
    }

    /// Admit a call for `key` now.
    pub fn admit(&self, key: &K) -> bool {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &K, now: Instant) -> bool {
        self.with_window(key, |w| w.admit(now))
    }

    /// Wait until a call for `key` is admitted, then record it.
    pub async fn acquire(&self, key: &K) {
        loop {
            let wait = self.with_window(key, |w| {
                let now = Instant::now();
                if w.admit(now) {
                    None
                } else {
                    Some(w.next_admission(now).max(Duration::from_millis(1)))
                }
            });
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }

    pub fn calls_in_window(&self, key: &K) -> usize {
        self.with_window(key, |w| w.calls_in_window(Instant::now()))
    }

    pub fn last_call(&self, key: &K) -> Option<Instant> {
        let windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        windows.get(key).and_then(SlidingWindow::last_call)
    }

    /// Drop all recorded history for every key.
    pub fn reset(&self) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests;
