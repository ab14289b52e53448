//! Promotes queued torrents into free active slots.
//!
//! At most one item is claimed per check, checks are throttled through the
//! same sliding-window primitive as API admission, and a claimed id is never
//! claimed again by this monitor even if it stays queued.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::AutoStartConfig;
use crate::item::Item;
use crate::rate_limit::{RateLimitConfig, SlidingWindow};

#[derive(Debug)]
pub struct AutoStartMonitor {
    policy: AutoStartConfig,
    processed: HashSet<u64>,
    throttle: SlidingWindow,
}

impl AutoStartMonitor {
    pub fn new(policy: AutoStartConfig, interval: Duration) -> Self {
        Self {
            policy,
            processed: HashSet::new(),
            throttle: SlidingWindow::new(RateLimitConfig {
                window: interval,
                max_calls: 1,
                min_interval: interval,
            }),
        }
    }

    pub fn policy(&self) -> AutoStartConfig {
        self.policy
    }

    pub fn set_policy(&mut self, policy: AutoStartConfig) {
        self.policy = policy;
    }

    pub fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    /// The item that should be started next, if any. Does not record anything.
    pub fn select<'a>(&self, items: &'a [Item]) -> Option<&'a Item> {
        if !self.policy.enabled {
            return None;
        }
        let active = items.iter().filter(|i| i.active).count();
        if active >= self.policy.concurrency_limit {
            return None;
        }
        items
            .iter()
            .find(|i| i.is_queued() && !self.processed.contains(&i.id))
    }

    pub fn claim(&mut self, items: &[Item]) -> Option<u64> {
        self.claim_at(items, Instant::now())
    }

    /// Throttled check: when admitted, picks one queued item and marks it
    /// processed. The caller issues the start command.
    pub fn claim_at(&mut self, items: &[Item], now: Instant) -> Option<u64> {
        if !self.policy.enabled || !self.throttle.admit(now) {
            return None;
        }
        let id = self.select(items)?.id;
        self.processed.insert(id);
        Some(id)
    }

    pub fn was_processed(&self, id: u64) -> bool {
        self.processed.contains(&id)
    }

    /// Forget processed ids and throttle history.
    pub fn reset(&mut self) {
        self.processed.clear();
        self.throttle.reset();
    }
}
