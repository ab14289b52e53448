//! Sliding-window admission state for one key.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Window size, call cap, and minimum spacing between admitted calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_calls: usize,
    pub min_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            max_calls: 5,
            min_interval: Duration::from_secs(2),
        }
    }
}

/// Timestamps of admitted calls within the last window plus `last_call`.
///
/// The deque never spans more than `window` nor holds more than `max_calls`
/// entries; it is pruned lazily on every check.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    config: RateLimitConfig,
    calls: VecDeque<Instant>,
    last_call: Option<Instant>,
}

impl SlidingWindow {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_calls: config.max_calls.max(1),
            ..config
        };
        Self {
            config,
            calls: VecDeque::with_capacity(config.max_calls),
            last_call: None,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.calls.front() {
            if now.saturating_duration_since(oldest) >= self.config.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Check-and-record in one step. Returns false without recording when the
    /// minimum interval has not elapsed or the window is full.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_call {
            if now.saturating_duration_since(last) < self.config.min_interval {
                return false;
            }
        }
        self.prune(now);
        if self.calls.len() >= self.config.max_calls {
            return false;
        }
        self.calls.push_back(now);
        self.last_call = Some(now);
        true
    }

    /// How long until `admit` could succeed. Zero when it would succeed now.
    pub fn next_admission(&self, now: Instant) -> Duration {
        let spacing = self
            .last_call
            .map(|last| {
                self.config
                    .min_interval
                    .saturating_sub(now.saturating_duration_since(last))
            })
            .unwrap_or(Duration::ZERO);

        let live: Vec<Instant> = self
            .calls
            .iter()
            .copied()
            .filter(|t| now.saturating_duration_since(*t) < self.config.window)
            .collect();
        let capacity = if live.len() >= self.config.max_calls {
            // The slot frees when the oldest call that keeps us at the cap leaves the window.
            let idx = live.len() - self.config.max_calls;
            (live[idx] + self.config.window).saturating_duration_since(now)
        } else {
            Duration::ZERO
        };
        spacing.max(capacity)
    }

    /// Number of admitted calls still inside the window at `now`.
    pub fn calls_in_window(&self, now: Instant) -> usize {
        self.calls
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.config.window)
            .count()
    }

    pub fn last_call(&self) -> Option<Instant> {
        self.last_call
    }

    pub fn reset(&mut self) {
        self.calls.clear();
        self.last_call = None;
    }
}
