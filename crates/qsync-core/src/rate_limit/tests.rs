//! Tests for sliding-window admission.

use std::time::Duration;

use tokio::time::Instant;

use super::{RateLimitConfig, RateLimiter, SlidingWindow};
use crate::resource::ResourceClass;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn min_interval_blocks_close_calls() {
    let mut w = SlidingWindow::new(RateLimitConfig::default());
    let t0 = Instant::now();
    assert!(w.admit(t0));
    assert!(!w.admit(t0 + ms(1999)));
    assert!(w.admit(t0 + ms(2000)));
}

#[test]
fn window_caps_calls() {
    let mut w = SlidingWindow::new(RateLimitConfig {
        window: Duration::from_secs(10),
        max_calls: 3,
        min_interval: Duration::ZERO,
    });
    let t0 = Instant::now();
    assert!(w.admit(t0));
    assert!(w.admit(t0 + ms(100)));
    assert!(w.admit(t0 + ms(200)));
    assert!(!w.admit(t0 + ms(300)));
    assert_eq!(w.next_admission(t0 + ms(300)), ms(9700));
    // First call leaves the window at exactly t0 + 10s.
    assert!(w.admit(t0 + ms(10_000)));
}

#[test]
fn refusal_records_nothing() {
    let mut w = SlidingWindow::new(RateLimitConfig::default());
    let t0 = Instant::now();
    assert!(w.admit(t0));
    assert!(!w.admit(t0 + ms(500)));
    assert_eq!(w.last_call(), Some(t0));
    assert_eq!(w.calls_in_window(t0 + ms(500)), 1);
}

#[test]
fn admitted_calls_never_exceed_limits_over_any_window() {
    let config = RateLimitConfig::default();
    let mut w = SlidingWindow::new(config);
    let t0 = Instant::now();
    let mut admitted = Vec::new();
    // Hammer every 300ms for two minutes.
    for step in 0..400u64 {
        let now = t0 + ms(step * 300);
        if w.admit(now) {
            admitted.push(now);
        }
    }
    assert!(!admitted.is_empty());
    for pair in admitted.windows(2) {
        assert!(pair[1] - pair[0] >= config.min_interval);
    }
    for (i, start) in admitted.iter().enumerate() {
        let in_window = admitted[i..]
            .iter()
            .take_while(|t| **t - *start < config.window)
            .count();
        assert!(in_window <= config.max_calls);
    }
}

#[test]
fn limiter_keys_are_independent_and_reset_clears() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let t0 = Instant::now();
    assert!(limiter.admit_at(&ResourceClass::Torrents, t0));
    assert!(limiter.admit_at(&ResourceClass::Usenet, t0));
    assert!(!limiter.admit_at(&ResourceClass::Torrents, t0 + ms(10)));

    limiter.reset();
    assert!(limiter.last_call(&ResourceClass::Torrents).is_none());
    assert!(limiter.admit_at(&ResourceClass::Torrents, t0 + ms(10)));
}

#[tokio::test(start_paused = true)]
async fn acquire_waits_for_the_next_slot() {
    let limiter = RateLimiter::new(RateLimitConfig::default());
    let start = Instant::now();
    limiter.acquire(&ResourceClass::WebDl).await;
    limiter.acquire(&ResourceClass::WebDl).await;
    assert!(Instant::now() - start >= Duration::from_secs(2));
}
